use crate::analysis::audio::{decode_data_uri, decode_wav, wav_data_uri, Clip};
use crate::analysis::classify::classify;
use crate::analysis::doppler::{
    apply_doppler, apply_envelope, estimate_passage, observed_frequency, simulate_passing,
};
use crate::analysis::graph::render;
use crate::analysis::spectrogram::Stft;
use crate::analysis::table::parse_csv;
use crate::generator::profile::build_recording;
use crate::service::config::ServiceConfig;
use crate::service::store::ClipStore;
use bytes::Buf;
use futures_util::TryStreamExt;
use serde::Serialize;
use sigcore::channels::GraphRequest;
use sigcore::config::ChannelDomain;
use sigcore::interface::wire::{
    ChunkRequestBody, ChunkResponseBody, DetectResponse, DopplerPredictRequestBody,
    DopplerPredictResponseBody, DopplerRequestBody, DopplerResponseBody, DownsampleResponseBody,
    ErrorBody, RecordingBody,
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::multipart::FormData;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

const MAX_UPLOAD_BYTES: u64 = 64 * 1024 * 1024;

/// State shared by every request handler.
pub struct ServiceState {
    config: ServiceConfig,
    clips: ClipStore,
    stft: Stft,
}

pub type SharedState = Arc<ServiceState>;

impl ServiceState {
    pub fn new(config: ServiceConfig) -> SharedState {
        Arc::new(Self {
            config,
            clips: ClipStore::new(),
            stft: Stft::default(),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Full analysis of a clip; the analysed copy is kept for streaming.
    fn analyze_clip(&self, name: &str, native: Clip) -> DetectResponse {
        let clip = native.resampled(self.config.analysis_rate);
        let (label, confidence) = classify(&clip.samples, self.config.drone_threshold);
        let spectrogram = self.stft.analyze(&clip.samples, clip.rate);
        let mut initial_waveform = clip.window(0, self.config.window_samples());
        initial_waveform.sr = Some(native.rate);
        let duration = clip.duration();
        let file_id = self.clips.insert(name, clip);
        log::info!(
            "[service] analysed {} as {} ({:.2}s, {} clips held)",
            file_id,
            label,
            duration,
            self.clips.len()
        );
        DetectResponse {
            file_id,
            prediction: Some(label),
            confidence: Some(confidence),
            initial_waveform,
            spectrogram: Some(spectrogram),
            duration: Some(duration),
        }
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl ToString) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    fn not_found(message: impl ToString) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.to_string(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{:#}", err),
        }
    }

    fn into_response(self) -> Response {
        warp::reply::with_status(
            warp::reply::json(&ErrorBody {
                error: self.message,
            }),
            self.status,
        )
        .into_response()
    }
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> Result<Response, Infallible> {
    Ok(match result {
        Ok(body) => warp::reply::json(&body).into_response(),
        Err(err) => {
            log::warn!("[service] {} {}", err.status, err.message);
            err.into_response()
        }
    })
}

fn channel_domain(name: &str) -> Result<ChannelDomain, ApiError> {
    name.parse().map_err(ApiError::not_found)
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

impl Upload {
    fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    fn text(&self) -> Result<&str, ApiError> {
        std::str::from_utf8(&self.bytes).map_err(ApiError::bad_request)
    }
}

async fn collect_form(form: FormData) -> Result<HashMap<String, Upload>, ApiError> {
    let parts: Vec<_> = form.try_collect().await.map_err(ApiError::bad_request)?;
    let mut fields = HashMap::new();
    for part in parts {
        let field = part.name().to_string();
        let file_name = part.filename().unwrap_or_default().to_string();
        let bytes = part
            .stream()
            .try_fold(Vec::new(), |mut acc, mut buf| async move {
                while buf.has_remaining() {
                    let chunk = buf.chunk();
                    let len = chunk.len();
                    acc.extend_from_slice(chunk);
                    buf.advance(len);
                }
                Ok(acc)
            })
            .await
            .map_err(ApiError::bad_request)?;
        fields.insert(field, Upload { file_name, bytes });
    }
    Ok(fields)
}

async fn detect(form: FormData, state: SharedState) -> Result<Response, Infallible> {
    let result = async {
        let mut fields = collect_form(form).await?;
        let upload = fields
            .remove("audio")
            .ok_or_else(|| ApiError::bad_request("No audio file provided"))?;
        let native = decode_wav(&upload.bytes).map_err(|e| ApiError::bad_request(format!("{:#}", e)))?;
        if native.is_empty() {
            return Err(ApiError::bad_request("Audio file contains no samples"));
        }
        log::debug!("[service] detect: {}", upload.file_name);
        Ok::<_, ApiError>(state.analyze_clip(&upload.file_name, native))
    };
    respond(result.await)
}

fn next_chunk(state: &ServiceState, body: &ChunkRequestBody) -> Result<ChunkResponseBody, ApiError> {
    let clip = state
        .clips
        .get(&body.file_id)
        .ok_or_else(|| ApiError::not_found("File not found or session expired"))?;
    let window = state.config.window_samples();
    let new_position = body.position.max(0.0) as usize + state.config.step_samples();
    if new_position + window > clip.len() {
        return Ok(ChunkResponseBody::completed());
    }
    let chunk = clip.window(new_position, window);
    Ok(ChunkResponseBody {
        completed: false,
        time: chunk.time,
        amplitude: chunk.amplitude,
        new_position: Some(new_position as f64),
    })
}

async fn waveform_chunk(body: ChunkRequestBody, state: SharedState) -> Result<Response, Infallible> {
    respond(next_chunk(&state, &body))
}

async fn downsample(form: FormData) -> Result<Response, Infallible> {
    let result = async {
        let fields = collect_form(form).await?;
        let upload = fields
            .get("file")
            .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
        if upload.extension() != "wav" {
            return Err(ApiError::bad_request("Only WAV files are supported."));
        }
        let requested: i64 = match fields.get("new_rate") {
            Some(field) => field
                .text()?
                .trim()
                .parse()
                .map_err(|_| ApiError::bad_request("Invalid sample rate"))?,
            None => 0,
        };
        let native = decode_wav(&upload.bytes).map_err(|e| ApiError::bad_request(format!("{:#}", e)))?;
        let original_rate = native.rate;
        let new_rate = if requested <= 0 {
            original_rate / 2
        } else {
            requested.min(original_rate as i64) as u32
        };
        let downsampled = native.resampled(new_rate);
        log::info!(
            "[service] downsampled {} from {} Hz to {} Hz",
            upload.file_name,
            original_rate,
            new_rate
        );
        Ok::<_, ApiError>(DownsampleResponseBody {
            original_rate,
            new_rate,
            original_audio: Some(wav_data_uri(&native).map_err(ApiError::internal)?),
            downsampled_audio: wav_data_uri(&downsampled).map_err(ApiError::internal)?,
        })
    };
    respond(result.await)
}

fn clip_from_contents(contents: &str) -> Result<Clip, ApiError> {
    if contents.is_empty() {
        return Err(ApiError::bad_request("contents (data URI) is required"));
    }
    let bytes = decode_data_uri(contents).map_err(|e| ApiError::bad_request(format!("{:#}", e)))?;
    let clip = decode_wav(&bytes).map_err(|e| ApiError::bad_request(format!("{:#}", e)))?;
    if clip.is_empty() {
        return Err(ApiError::bad_request("audio has no samples"));
    }
    Ok(clip)
}

fn generate_doppler(state: &ServiceState, body: DopplerRequestBody) -> Result<DopplerResponseBody, ApiError> {
    let native = clip_from_contents(&body.contents)?;

    let mut shifted = apply_doppler(&native.samples, body.v_start, body.v_end);
    apply_envelope(&mut shifted, body.v_start, body.v_end);
    let shifted = Clip::new(shifted, native.rate);
    let src = wav_data_uri(&shifted).map_err(ApiError::internal)?;
    let analysis = state.analyze_clip("doppler.wav", shifted);

    let status = format!(
        "Doppler applied across full clip: v_i={} m/s -> v_f={} m/s",
        body.v_start, body.v_end
    );
    let observed = body
        .f_source
        .map(|f| {
            format!(
                "Observed frequency: {:.1} Hz -> {:.1} Hz",
                observed_frequency(f, body.v_start),
                observed_frequency(f, body.v_end)
            )
        })
        .unwrap_or_default();
    Ok(DopplerResponseBody {
        src,
        file_id: analysis.file_id,
        initial_waveform: analysis.initial_waveform,
        spectrogram: analysis.spectrogram,
        status,
        observed,
    })
}

async fn doppler(body: DopplerRequestBody, state: SharedState) -> Result<Response, Infallible> {
    respond(generate_doppler(&state, body))
}

fn simulate(state: &ServiceState, body: DopplerRequestBody) -> Result<DopplerResponseBody, ApiError> {
    let native = clip_from_contents(&body.contents)?;
    let passing = simulate_passing(&native.samples, body.v_start, body.v_end);
    let clip = Clip::new(passing.samples, native.rate);
    let src = wav_data_uri(&clip).map_err(ApiError::internal)?;
    let analysis = state.analyze_clip("passing.wav", clip);

    let status = format!(
        "Car passing simulation: v_i={} m/s -> v_f={} m/s",
        body.v_start, body.v_end
    );
    let observed = body
        .f_source
        .map(|f| {
            format!(
                "Start {:.1} Hz, end of approach {:.1} Hz, receding {:.1} Hz",
                observed_frequency(f, body.v_start),
                observed_frequency(f, body.v_end),
                observed_frequency(f, passing.recede_end)
            )
        })
        .unwrap_or_default();
    Ok(DopplerResponseBody {
        src,
        file_id: analysis.file_id,
        initial_waveform: analysis.initial_waveform,
        spectrogram: analysis.spectrogram,
        status,
        observed,
    })
}

async fn doppler_simulate(body: DopplerRequestBody, state: SharedState) -> Result<Response, Infallible> {
    respond(simulate(&state, body))
}

async fn doppler_predict(
    body: DopplerPredictRequestBody,
    state: SharedState,
) -> Result<Response, Infallible> {
    let result = clip_from_contents(&body.contents).and_then(|clip| {
        let grid = state.stft.analyze(&clip.samples, clip.rate);
        let estimate = estimate_passage(&grid)
            .ok_or_else(|| ApiError::bad_request("audio too short to estimate"))?;
        Ok(DopplerPredictResponseBody {
            predicted_start_speed: estimate.start_speed,
            predicted_end_speed: estimate.end_speed,
            predicted_source_frequency: estimate.source_frequency,
        })
    });
    respond(result)
}

async fn channel_demo(domain: String, state: SharedState) -> Result<Response, Infallible> {
    let result = channel_domain(&domain).and_then(|domain| {
        build_recording(domain, state.config.generator(domain)).map_err(ApiError::internal)
    });
    respond(result)
}

async fn channel_upload(
    domain: String,
    form: FormData,
    state: SharedState,
) -> Result<Response, Infallible> {
    let result = async {
        let domain = channel_domain(&domain)?;
        let fields = collect_form(form).await?;
        let upload = fields
            .get("file")
            .ok_or_else(|| ApiError::bad_request("No file provided"))?;
        let data = match upload.extension().as_str() {
            "csv" => parse_csv(upload.text()?).map_err(|e| ApiError::bad_request(format!("{:#}", e)))?,
            "npy" => return Err(ApiError::bad_request("NumPy uploads are not supported by this service")),
            other => return Err(ApiError::bad_request(format!("Unsupported file type '{}'", other))),
        };
        let fs = state.config.generator(domain).fs;
        let samples = data.first().map(Vec::len).unwrap_or(0);
        Ok::<_, ApiError>(RecordingBody {
            channels: data.len(),
            data,
            fs,
            duration: samples as f64 / fs,
            prediction: Some("Unknown".into()),
            confidence: None,
            status: Some(format!("Uploaded {}", upload.file_name)),
        })
    };
    respond(result.await)
}

async fn channel_graph(domain: String, request: GraphRequest) -> Result<Response, Infallible> {
    respond(channel_domain(&domain).map(|domain| render(domain, &request)))
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let error = if err.is_not_found() {
        ApiError::not_found("Not found")
    } else if let Some(cause) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiError::bad_request(cause)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError {
            status: StatusCode::METHOD_NOT_ALLOWED,
            message: "Method not allowed".into(),
        }
    } else {
        ApiError::bad_request(format!("Malformed request: {:?}", err))
    };
    Ok(error.into_response())
}

/// Every service endpoint, mounted under `/api`.
pub fn routes(state: SharedState) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
    let with_state = warp::any().map(move || state.clone());
    let multipart = warp::multipart::form().max_length(MAX_UPLOAD_BYTES);

    let detect_route = warp::path!("drone" / "detect")
        .and(warp::post())
        .and(multipart.clone())
        .and(with_state.clone())
        .and_then(detect);

    let chunk_route = warp::path!("drone" / "waveform-chunk")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state.clone())
        .and_then(waveform_chunk);

    let downsample_route = warp::path!("audio" / "downsample")
        .and(warp::post())
        .and(multipart.clone())
        .and_then(downsample);

    let doppler_route = warp::path!("doppler" / "generate")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state.clone())
        .and_then(doppler);

    let simulate_route = warp::path!("doppler" / "simulate")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state.clone())
        .and_then(doppler_simulate);

    let predict_route = warp::path!("doppler" / "predict")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state.clone())
        .and_then(doppler_predict);

    let demo_route = warp::path!(String / "demo")
        .and(warp::post())
        .and(with_state.clone())
        .and_then(channel_demo);

    let upload_route = warp::path!(String / "upload")
        .and(warp::post())
        .and(multipart)
        .and(with_state)
        .and_then(channel_upload);

    let graph_route = warp::path!(String / "graph")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(channel_graph);

    warp::path("api")
        .and(
            detect_route
                .or(chunk_route)
                .unify()
                .or(downsample_route)
                .unify()
                .or(doppler_route)
                .unify()
                .or(simulate_route)
                .unify()
                .or(predict_route)
                .unify()
                .or(demo_route)
                .unify()
                .or(upload_route)
                .unify()
                .or(graph_route)
                .unify(),
        )
        .recover(handle_rejection)
        .unify()
}
