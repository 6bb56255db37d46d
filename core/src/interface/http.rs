use crate::channels::{GraphFrame, GraphRequest, MultiChannelBackend, Recording};
use crate::config::{BackendConfig, ChannelDomain, ControllerConfig, Domain};
use crate::interface::wire::{
    analysis_from_wire, ChunkRequestBody, ChunkResponseBody, DetectResponse,
    DopplerPredictRequestBody, DopplerPredictResponseBody, DopplerRequestBody, DopplerResponseBody,
    DownsampleResponseBody, ErrorBody, GraphResponseBody, RecordingBody,
};
use crate::prelude::{
    AnalysisBackend, AnalysisResult, ChunkResponse, DashResult, DashboardError, DerivedSignal,
    DopplerParams, DopplerPrediction, DopplerSynthesis, Source,
};
use crate::telemetry::LogManager;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

/// Client for the analysis service.
///
/// Every call is a single request/response; there are no retries and no
/// timeouts, a hung call simply keeps its pipeline waiting.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    domain: Domain,
    analysis_path: String,
    channel_domain: ChannelDomain,
    fallback_rate: u32,
}

impl HttpBackend {
    pub fn new(backend: &BackendConfig, controller: &ControllerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: backend.base_url.trim_end_matches('/').to_string(),
            domain: backend.domain,
            analysis_path: backend.analysis_path.trim_matches('/').to_string(),
            channel_domain: backend.channel_domain,
            fallback_rate: controller.fallback_sample_rate,
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, String> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| e.to_string());
        }
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => Err(body.error),
            Err(_) if text.is_empty() => Err(status.to_string()),
            Err(_) => Err(format!("{}: {}", status, text)),
        }
    }

    fn file_part(source: &Source) -> Result<Part, String> {
        Part::bytes(source.bytes().to_vec())
            .file_name(source.name().to_string())
            .mime_str(source.media_type())
            .map_err(|e| e.to_string())
    }

    async fn detect(&self, source: &Source) -> Result<AnalysisResult, String> {
        let form = Form::new().part("audio", Self::file_part(source)?);
        let response = self
            .client
            .post(self.url(&format!("{}/detect/", self.analysis_path)))
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let reply: DetectResponse = Self::read_json(response).await?;
        reply.into_analysis(self.fallback_rate)
    }

    async fn downsample(
        &self,
        source: &Source,
        target_rate: u32,
    ) -> Result<DownsampleResponseBody, String> {
        let form = Form::new()
            .part("file", Self::file_part(source)?)
            .text("new_rate", target_rate.to_string());
        let response = self
            .client
            .post(self.url("audio/downsample/"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::read_json(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, String>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::read_json(response).await
    }
}

impl AnalysisBackend for HttpBackend {
    async fn analyze(&self, source: &Source) -> DashResult<AnalysisResult> {
        self.detect(source).await.map_err(DashboardError::analysis)
    }

    async fn fetch_chunk(&self, analysis_id: &str, position: f64) -> DashResult<ChunkResponse> {
        let body = ChunkRequestBody {
            file_id: analysis_id.to_string(),
            position,
        };
        let path = format!("{}/waveform-chunk/", self.analysis_path);
        let reply: ChunkResponseBody = self
            .post_json(&path, &body)
            .await
            .map_err(DashboardError::chunk)?;
        reply.into_response(position).map_err(DashboardError::chunk)
    }

    async fn resample(&self, source: &Source, target_rate: u32) -> DashResult<DerivedSignal> {
        let reply = self
            .downsample(source, target_rate)
            .await
            .map_err(DashboardError::analysis)?;
        let stem = source
            .name()
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(source.name());
        let derived = Source::from_data_uri(
            format!("{}_{}hz.wav", stem, reply.new_rate),
            &reply.downsampled_audio,
        )
        .map_err(DashboardError::analysis)?;
        let mut analysis = self
            .detect(&derived)
            .await
            .map_err(DashboardError::analysis)?;
        analysis.sample_rate = reply.new_rate;
        analysis.original_rate = Some(reply.original_rate);
        Ok(DerivedSignal {
            source: derived,
            analysis,
        })
    }
}

impl HttpBackend {
    fn require_doppler_page(&self, operation: &str) -> DashResult<()> {
        if self.domain == Domain::Doppler {
            return Ok(());
        }
        Err(DashboardError::Unsupported(format!(
            "{} on the {} page",
            operation,
            self.domain.path()
        )))
    }

    /// Posts one Doppler rendition request and binds the returned clip.
    async fn render_doppler(
        &self,
        path: &str,
        prefix: &str,
        source: &Source,
        params: DopplerParams,
    ) -> DashResult<DerivedSignal> {
        let body = DopplerRequestBody {
            contents: source.to_data_uri(),
            v_start: params.v_start,
            v_end: params.v_end,
            f_source: Some(params.f_source),
        };
        let reply: DopplerResponseBody = self
            .post_json(path, &body)
            .await
            .map_err(DashboardError::analysis)?;
        LogManager::new("doppler").record(&format!("{} {}", reply.status, reply.observed));
        let derived = Source::from_data_uri(format!("{}_{}", prefix, source.name()), &reply.src)
            .map_err(DashboardError::analysis)?;
        let analysis = analysis_from_wire(
            reply.file_id,
            None,
            None,
            reply.initial_waveform,
            reply.spectrogram,
            None,
            self.fallback_rate,
        )
        .map_err(DashboardError::analysis)?;
        Ok(DerivedSignal {
            source: derived,
            analysis,
        })
    }
}

impl DopplerSynthesis for HttpBackend {
    async fn generate_doppler(
        &self,
        source: &Source,
        params: DopplerParams,
    ) -> DashResult<DerivedSignal> {
        self.require_doppler_page("Doppler synthesis")?;
        self.render_doppler("doppler/generate/", "doppler", source, params)
            .await
    }

    async fn simulate_passing(
        &self,
        source: &Source,
        params: DopplerParams,
    ) -> DashResult<DerivedSignal> {
        self.require_doppler_page("Pass-by simulation")?;
        self.render_doppler("doppler/simulate/", "passing", source, params)
            .await
    }

    async fn predict(&self, source: &Source) -> DashResult<DopplerPrediction> {
        self.require_doppler_page("Doppler prediction")?;
        let body = DopplerPredictRequestBody {
            contents: source.to_data_uri(),
        };
        let reply: DopplerPredictResponseBody = self
            .post_json("doppler/predict/", &body)
            .await
            .map_err(DashboardError::analysis)?;
        let prediction = DopplerPrediction::from(reply);
        LogManager::new("doppler").record(&format!(
            "predicted {:.2} -> {:.2} m/s at {:.1} Hz",
            prediction.start_speed, prediction.end_speed, prediction.source_frequency
        ));
        Ok(prediction)
    }
}

impl MultiChannelBackend for HttpBackend {
    async fn load_demo(&self) -> DashResult<Recording> {
        let path = format!("{}/demo/", self.channel_domain.path());
        let body: RecordingBody = self
            .post_json(&path, &serde_json::json!({}))
            .await
            .map_err(DashboardError::analysis)?;
        Ok(body.into())
    }

    async fn upload(&self, source: &Source) -> DashResult<Recording> {
        let upload = async {
            let form = Form::new().part("file", Self::file_part(source)?);
            let response = self
                .client
                .post(self.url(&format!("{}/upload/", self.channel_domain.path())))
                .multipart(form)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            Self::read_json::<RecordingBody>(response).await
        };
        upload
            .await
            .map(Recording::from)
            .map_err(DashboardError::analysis)
    }

    async fn graph(&self, request: GraphRequest) -> DashResult<GraphFrame> {
        let path = format!("{}/graph/", self.channel_domain.path());
        let body: GraphResponseBody = self
            .post_json(&path, &request)
            .await
            .map_err(DashboardError::analysis)?;
        Ok(body.into())
    }
}
