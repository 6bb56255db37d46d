use charts::{apply_zoom, ChannelChart, SpectrogramChart, WaveformChart, ZoomAction};
use config::VisualizerConfig;
use iced::{
    time,
    widget::{
        button, column, row, scrollable, slider, text, text_input, Canvas, Column, Container, Row,
    },
    Alignment, Element, Length, Subscription, Task, Theme,
};
use sigcore::channels::{
    ChannelEffect, ChannelFeedback, ChannelViewer, Colormap, PolarMode, ViewerKind,
};
use sigcore::config::Domain;
use sigcore::interface::HttpBackend;
use sigcore::pipeline::PlaybackStatus;
use sigcore::prelude::{
    DashResult, DerivedSignal, DopplerParams, DopplerPrediction, DopplerSynthesis, RawFile, Source,
    ViewerSlot,
};
use sigcore::presentation::ViewerFrame;
use sigcore::telemetry::{MetricsSnapshot, RequestKind};
use sigcore::runtime::{perform, perform_channel};
use sigcore::{Effect, Feedback, SignalController};

mod charts;
mod config;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = VisualizerConfig::from_args()?;
    log::info!(
        "[visualizer] {} page against {}",
        config.dashboard.backend.domain.path(),
        config.dashboard.backend.base_url
    );
    iced::application(
        move || Dashboard::boot(config.clone()),
        Dashboard::update,
        Dashboard::view,
    )
    .title(application_title)
    .subscription(application_subscription)
    .theme(application_theme)
    .run()?;
    Ok(())
}

fn application_title(state: &Dashboard) -> String {
    match state.controller.source() {
        Some(source) => format!("Signal Dashboard - {}", source.name()),
        None => "Signal Dashboard".into(),
    }
}

fn application_subscription(state: &Dashboard) -> Subscription<Message> {
    time::every(state.controller.config().tick_interval()).map(|_| Message::Tick)
}

fn application_theme(_: &Dashboard) -> Theme {
    Theme::Dark
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Audio,
    Channels,
}

/// Doppler renditions the page can attach as comparison members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendition {
    Doppler,
    Passing,
}

impl Rendition {
    fn label(self) -> &'static str {
        match self {
            Rendition::Doppler => "Doppler",
            Rendition::Passing => "Passing",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DopplerField {
    VStart,
    VEnd,
    FSource,
}

#[derive(Debug, Clone)]
enum Message {
    Tick,
    SelectTab(Tab),
    PathChanged(String),
    LoadFile,
    Start(ViewerSlot),
    Pause(ViewerSlot),
    Restart(ViewerSlot),
    ToggleComparison,
    SliderChanged(u32),
    Carousel(isize),
    Zoom(ZoomAction),
    DismissError,
    Audio(Feedback),
    DopplerFieldChanged(DopplerField, String),
    Render(Rendition),
    Rendered(Rendition, Source, DashResult<DerivedSignal>),
    Predict,
    Predicted(Source, DashResult<DopplerPrediction>),
    LoadDemo,
    ChannelPathChanged(String),
    UploadChannels,
    ChannelPlay,
    ChannelPause,
    ChannelReset,
    ToggleChannel(usize),
    SelectKind(ViewerKind),
    ChannelZoom(f64),
    ChannelSeek(f64),
    ChannelSpeed(f64),
    ChunkDuration(f64),
    SelectColormap(Colormap),
    SelectPolarMode(PolarMode),
    RecurrencePair(usize, usize),
    UndersampleChanged(u32),
    ClearUndersample,
    Channel(ChannelFeedback),
}

struct DopplerForm {
    v_start: String,
    v_end: String,
    f_source: String,
}

impl DopplerForm {
    fn from_params(params: DopplerParams) -> Self {
        Self {
            v_start: params.v_start.to_string(),
            v_end: params.v_end.to_string(),
            f_source: params.f_source.to_string(),
        }
    }

    fn update_field(&mut self, field: DopplerField, value: String) {
        match field {
            DopplerField::VStart => self.v_start = value,
            DopplerField::VEnd => self.v_end = value,
            DopplerField::FSource => self.f_source = value,
        }
    }

    fn to_params(&self) -> Result<DopplerParams, String> {
        let parse = |name: &str, value: &str| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("{} must be a number, got '{}'", name, value))
        };
        Ok(DopplerParams {
            v_start: parse("start velocity", &self.v_start)?,
            v_end: parse("end velocity", &self.v_end)?,
            f_source: parse("source frequency", &self.f_source)?,
        })
    }
}

struct Dashboard {
    backend: HttpBackend,
    controller: SignalController,
    channels: ChannelViewer,
    tab: Tab,
    path: String,
    channel_path: String,
    doppler: DopplerForm,
    prediction: Option<DopplerPrediction>,
    history: Vec<String>,
    history_len: usize,
}

impl Dashboard {
    fn boot(config: VisualizerConfig) -> (Self, Task<Message>) {
        let dashboard = &config.dashboard;
        let controller = SignalController::new(dashboard.controller.clone());
        let channels = ChannelViewer::with_metrics(
            dashboard.backend.channel_domain,
            &dashboard.controller,
            controller.metrics().clone(),
        );
        let mut state = Dashboard {
            backend: HttpBackend::new(&dashboard.backend, &dashboard.controller),
            controller,
            channels,
            tab: Tab::Audio,
            path: String::new(),
            channel_path: String::new(),
            doppler: DopplerForm::from_params(DopplerParams::default()),
            prediction: None,
            history: Vec::new(),
            history_len: config.history_len.max(1),
        };
        let task = match &config.initial_file {
            Some(path) => {
                state.path = path.display().to_string();
                state.load_file()
            }
            None => Task::none(),
        };
        (state, task)
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                let audio = state.controller.tick();
                let channel = state.channels.tick();
                Task::batch([state.run(audio), state.run_channel(channel)])
            }
            Message::SelectTab(tab) => {
                state.tab = tab;
                Task::none()
            }
            Message::PathChanged(path) => {
                state.path = path;
                Task::none()
            }
            Message::LoadFile => state.load_file(),
            Message::Start(slot) => {
                if !state.controller.start(slot) {
                    state.push_history(format!("{} viewer has nothing to play", slot.label()));
                }
                Task::none()
            }
            Message::Pause(slot) => {
                state.controller.pause(slot);
                Task::none()
            }
            Message::Restart(slot) => {
                state.controller.restart(slot);
                Task::none()
            }
            Message::ToggleComparison => {
                if state.controller.comparison().is_enabled() {
                    state.controller.disable_comparison();
                    state.push_history("Comparison off".into());
                    return Task::none();
                }
                match state.controller.enable_comparison() {
                    Ok(effects) => {
                        state.push_history("Comparison on".into());
                        state.run(effects)
                    }
                    Err(err) => {
                        state.push_history(format!("Comparison unavailable: {}", err));
                        Task::none()
                    }
                }
            }
            Message::SliderChanged(value) => {
                let effects = state.controller.on_slider_change(value);
                state.run(effects)
            }
            Message::Carousel(delta) => {
                state.controller.move_carousel(delta);
                Task::none()
            }
            Message::Zoom(action) => {
                let full = state.controller.primary().window().span();
                let next = apply_zoom(action, state.controller.comparison().zoom(), full);
                state.controller.set_zoom(next);
                Task::none()
            }
            Message::DismissError => {
                state.controller.dismiss_error();
                state.channels.dismiss_error();
                Task::none()
            }
            Message::Audio(feedback) => {
                let effects = state.controller.feed(feedback);
                state.run(effects)
            }
            Message::DopplerFieldChanged(field, value) => {
                state.doppler.update_field(field, value);
                Task::none()
            }
            Message::Render(rendition) => {
                let params = match state.doppler.to_params() {
                    Ok(params) => params,
                    Err(err) => {
                        state.push_history(err);
                        return Task::none();
                    }
                };
                let Some(source) = state.controller.source().cloned() else {
                    state.push_history(format!("Upload audio before the {} rendition", rendition.label()));
                    return Task::none();
                };
                let backend = state.backend.clone();
                Task::perform(
                    async move {
                        let result = match rendition {
                            Rendition::Doppler => backend.generate_doppler(&source, params).await,
                            Rendition::Passing => backend.simulate_passing(&source, params).await,
                        };
                        (source, result)
                    },
                    move |(source, result)| Message::Rendered(rendition, source, result),
                )
            }
            Message::Rendered(rendition, base, Ok(derived)) => {
                let name = derived.source.name().to_string();
                match state.controller.attach_variant(rendition.label(), &base, derived) {
                    Ok(effects) => {
                        state.push_history(format!("{} rendition {} attached", rendition.label(), name));
                        state.run(effects)
                    }
                    Err(err) => {
                        state.push_history(format!("{} rendition dropped: {}", rendition.label(), err));
                        Task::none()
                    }
                }
            }
            Message::Rendered(rendition, _, Err(err)) => {
                state.push_history(format!("{} rendition failed: {}", rendition.label(), err));
                Task::none()
            }
            Message::Predict => {
                let Some(source) = state.controller.source().cloned() else {
                    return Task::none();
                };
                let backend = state.backend.clone();
                Task::perform(
                    async move {
                        let result = backend.predict(&source).await;
                        (source, result)
                    },
                    |(source, result)| Message::Predicted(source, result),
                )
            }
            Message::Predicted(base, result) => {
                if !state.controller.source().is_some_and(|current| current.same_as(&base)) {
                    state.push_history(format!("Prediction for {} dropped, file replaced", base.name()));
                    return Task::none();
                }
                match result {
                    Ok(prediction) => state.prediction = Some(prediction),
                    Err(err) => {
                        state.prediction = None;
                        state.push_history(format!("Prediction failed: {}", err));
                    }
                }
                Task::none()
            }
            Message::LoadDemo => {
                let effects = state.channels.load_demo();
                state.push_history("Loading demo recording".into());
                state.run_channel(effects)
            }
            Message::ChannelPathChanged(path) => {
                state.channel_path = path;
                Task::none()
            }
            Message::UploadChannels => {
                let raw = match RawFile::from_path(state.channel_path.trim()) {
                    Ok(raw) => raw,
                    Err(err) => {
                        state.push_history(format!("Cannot read {}: {}", state.channel_path, err));
                        return Task::none();
                    }
                };
                match state.channels.accept(raw) {
                    Ok(effects) => state.run_channel(effects),
                    Err(err) => {
                        state.push_history(format!("Upload rejected: {}", err));
                        Task::none()
                    }
                }
            }
            Message::ChannelPlay => {
                state.channels.play();
                Task::none()
            }
            Message::ChannelPause => {
                state.channels.pause();
                Task::none()
            }
            Message::ChannelReset => {
                let effects = state.channels.reset();
                state.run_channel(effects)
            }
            Message::ToggleChannel(channel) => {
                let effects = state.channels.toggle_channel(channel);
                state.run_channel(effects)
            }
            Message::SelectKind(kind) => {
                let effects = state.channels.set_kind(kind);
                state.run_channel(effects)
            }
            Message::ChannelZoom(factor) => {
                let seconds = state.channels.snapshot().zoom * factor;
                let effects = state.channels.set_zoom(seconds);
                state.run_channel(effects)
            }
            Message::ChannelSeek(position) => {
                let effects = state.channels.seek(position);
                state.run_channel(effects)
            }
            Message::ChannelSpeed(speed) => {
                state.channels.set_speed(speed);
                Task::none()
            }
            Message::ChunkDuration(factor) => {
                let seconds = state.channels.snapshot().chunk_duration * factor;
                let effects = state.channels.set_chunk_duration(seconds);
                state.run_channel(effects)
            }
            Message::SelectColormap(colormap) => {
                let effects = state.channels.set_colormap(colormap);
                state.run_channel(effects)
            }
            Message::SelectPolarMode(mode) => {
                let effects = state.channels.set_polar_mode(mode);
                state.run_channel(effects)
            }
            Message::RecurrencePair(x, y) => {
                let effects = state.channels.set_recurrence_pair(x, y);
                state.run_channel(effects)
            }
            Message::UndersampleChanged(frequency) => {
                let effects = state.channels.on_undersample_change(frequency);
                state.run_channel(effects)
            }
            Message::ClearUndersample => {
                let effects = state.channels.clear_undersample();
                state.run_channel(effects)
            }
            Message::Channel(feedback) => {
                let effects = state.channels.feed(feedback);
                state.run_channel(effects)
            }
        }
    }

    fn load_file(&mut self) -> Task<Message> {
        let path = self.path.trim().to_string();
        let raw = match RawFile::from_path(&path) {
            Ok(raw) => raw,
            Err(err) => {
                self.push_history(format!("Cannot read {}: {}", path, err));
                return Task::none();
            }
        };
        match self.controller.accept(raw) {
            Ok(effects) => {
                self.prediction = None;
                self.push_history(format!("Analysing {}", path));
                self.run(effects)
            }
            Err(err) => {
                self.push_history(format!("Upload rejected: {}", err));
                Task::none()
            }
        }
    }

    fn run(&self, effects: Vec<Effect>) -> Task<Message> {
        Task::batch(effects.into_iter().map(|effect| {
            let backend = self.backend.clone();
            Task::perform(
                async move { perform(&backend, effect).await },
                Message::Audio,
            )
        }))
    }

    fn run_channel(&self, effects: Vec<ChannelEffect>) -> Task<Message> {
        Task::batch(effects.into_iter().map(|effect| {
            let backend = self.backend.clone();
            Task::perform(
                async move { perform_channel(&backend, effect).await },
                Message::Channel,
            )
        }))
    }

    fn push_history(&mut self, entry: String) {
        log::info!("[visualizer] {}", entry);
        self.history.push(entry);
        if self.history.len() > self.history_len {
            self.history.remove(0);
        }
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let tabs = row![
            tab_button("Audio", Tab::Audio, state.tab),
            tab_button("Channels", Tab::Channels, state.tab),
        ]
        .spacing(8);

        let page = match state.tab {
            Tab::Audio => state.audio_view(),
            Tab::Channels => state.channel_view(),
        };

        let history_list = if state.history.is_empty() {
            Column::new().push(text("No activity yet").size(12))
        } else {
            state
                .history
                .iter()
                .rev()
                .fold(Column::new().spacing(4), |col, entry| {
                    col.push(text(entry.as_str()).size(12))
                })
        };

        let layout = column![
            tabs,
            page,
            text("Activity log").size(16),
            Container::new(scrollable(history_list).height(Length::Fixed(90.0))).padding(6),
        ]
        .spacing(12)
        .padding(20);

        Container::new(scrollable(layout))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn audio_view(&self) -> Element<'_, Message> {
        let snapshot = self.controller.snapshot();
        let comparison = &snapshot.comparison;

        let intake = row![
            text_input("Path to an audio file", &self.path)
                .on_input(Message::PathChanged)
                .on_submit(Message::LoadFile)
                .padding(6),
            button("Load").on_press(Message::LoadFile).padding(8),
        ]
        .spacing(8)
        .align_y(Alignment::Center);

        let status = if snapshot.analyzing {
            text("Analysing...").size(16)
        } else {
            match self.controller.primary().analysis() {
                Some(analysis) => text(format!(
                    "{} Hz, {:.2}s",
                    analysis.sample_rate, analysis.duration_seconds
                ))
                .size(16),
                None => text("No signal loaded").size(16),
            }
        };

        let mut page = Column::new()
            .spacing(10)
            .push(intake)
            .push(status)
            .push(text(metrics_line(&snapshot.metrics)).size(12));
        if let Some(err) = self.controller.last_error() {
            page = page.push(
                row![
                    text(format!("Error: {}", err)).size(14),
                    button("Dismiss").on_press(Message::DismissError).padding(4),
                ]
                .spacing(8)
                .align_y(Alignment::Center),
            );
        }

        let compare_label = if comparison.enabled {
            "Disable comparison"
        } else {
            "Enable comparison"
        };
        let mut toolbar = row![
            button(compare_label)
                .on_press_maybe(self.controller.primary().analysis().map(|_| Message::ToggleComparison))
                .padding(8),
            button("Zoom in").on_press(Message::Zoom(ZoomAction::In)).padding(8),
            button("Zoom out").on_press(Message::Zoom(ZoomAction::Out)).padding(8),
            button("<").on_press(Message::Zoom(ZoomAction::PanLeft)).padding(8),
            button(">").on_press(Message::Zoom(ZoomAction::PanRight)).padding(8),
            button("Reset zoom").on_press(Message::Zoom(ZoomAction::Reset)).padding(8),
        ]
        .spacing(8)
        .align_y(Alignment::Center);
        if self.backend.domain() == Domain::Doppler {
            toolbar = toolbar.push(self.doppler_controls());
        }
        page = page.push(toolbar);
        if let Some(prediction) = &self.prediction {
            page = page.push(text(prediction_banner(prediction)).size(14));
        }

        if comparison.enabled {
            let recompute = if comparison.recomputing {
                " (recomputing)".to_string()
            } else {
                comparison
                    .committed_value
                    .map(|rate| format!(" (showing {} Hz)", rate))
                    .unwrap_or_default()
            };
            page = page.push(
                row![
                    text(format!("Resample rate {} Hz{}", comparison.slider_value, recompute))
                        .size(14),
                    slider(
                        comparison.slider_min..=comparison.slider_max,
                        comparison.slider_value,
                        Message::SliderChanged,
                    )
                    .step(comparison.slider_step.max(1)),
                    button("Prev")
                        .on_press_maybe(comparison.can_move(-1).then_some(Message::Carousel(-1)))
                        .padding(6),
                    button("Next")
                        .on_press_maybe(comparison.can_move(1).then_some(Message::Carousel(1)))
                        .padding(6),
                ]
                .spacing(10)
                .align_y(Alignment::Center),
            );
            if let Some(err) = &comparison.error {
                page = page.push(text(format!("Recompute failed: {}", err)).size(14));
            }
        }

        let viewers = self
            .controller
            .frames()
            .into_iter()
            .fold(Row::new().spacing(16), |row, frame| {
                row.push(viewer_panel(frame))
            });
        page.push(viewers).into()
    }

    fn doppler_controls(&self) -> Element<'_, Message> {
        row![
            text_input("v start (m/s)", &self.doppler.v_start)
                .on_input(|value| Message::DopplerFieldChanged(DopplerField::VStart, value))
                .width(Length::Fixed(90.0))
                .padding(6),
            text_input("v end (m/s)", &self.doppler.v_end)
                .on_input(|value| Message::DopplerFieldChanged(DopplerField::VEnd, value))
                .width(Length::Fixed(90.0))
                .padding(6),
            text_input("f source (Hz)", &self.doppler.f_source)
                .on_input(|value| Message::DopplerFieldChanged(DopplerField::FSource, value))
                .width(Length::Fixed(90.0))
                .padding(6),
            button("Generate Doppler")
                .on_press_maybe(
                    self.controller
                        .source()
                        .map(|_| Message::Render(Rendition::Doppler)),
                )
                .padding(8),
            button("Simulate passing")
                .on_press_maybe(
                    self.controller
                        .source()
                        .map(|_| Message::Render(Rendition::Passing)),
                )
                .padding(8),
            button("Predict")
                .on_press_maybe(self.controller.source().map(|_| Message::Predict))
                .padding(8),
        ]
        .spacing(6)
        .align_y(Alignment::Center)
        .into()
    }

    fn channel_view(&self) -> Element<'_, Message> {
        let snapshot = self.channels.snapshot();

        let intake = row![
            button("Load demo").on_press(Message::LoadDemo).padding(8),
            text_input("Path to a CSV recording", &self.channel_path)
                .on_input(Message::ChannelPathChanged)
                .on_submit(Message::UploadChannels)
                .padding(6),
            button("Upload").on_press(Message::UploadChannels).padding(8),
        ]
        .spacing(8)
        .align_y(Alignment::Center);

        let summary = match (&snapshot.source_name, snapshot.loading) {
            (_, true) => "Loading...".to_string(),
            (name, false) if snapshot.channel_count > 0 => format!(
                "{}: {} channels, {:.1}s, prediction {} ({:.0}%)",
                name.as_deref().unwrap_or("demo"),
                snapshot.channel_count,
                snapshot.duration,
                snapshot.prediction.as_deref().unwrap_or("n/a"),
                snapshot.confidence.unwrap_or(0.0) * 100.0
            ),
            _ => "No recording loaded".to_string(),
        };

        let transport = row![
            button(if snapshot.playing { "Pause" } else { "Play" })
                .on_press(if snapshot.playing {
                    Message::ChannelPause
                } else {
                    Message::ChannelPlay
                })
                .padding(8),
            button("Reset").on_press(Message::ChannelReset).padding(8),
            button("Zoom in").on_press(Message::ChannelZoom(0.5)).padding(8),
            button("Zoom out").on_press(Message::ChannelZoom(2.0)).padding(8),
            text(format!(
                "{:.2}s / {:.2}s, window {:.1}s",
                snapshot.position, snapshot.duration, snapshot.zoom
            ))
            .size(14),
        ]
        .spacing(8)
        .align_y(Alignment::Center);

        let kinds = ViewerKind::ALL
            .into_iter()
            .fold(Row::new().spacing(6), |row, kind| {
                row.push(
                    button(kind_label(kind))
                        .on_press_maybe((kind != snapshot.kind).then_some(Message::SelectKind(kind)))
                        .padding(6),
                )
            });

        let toggles = snapshot.channel_names.iter().enumerate().fold(
            Row::new().spacing(4),
            |row, (index, name)| {
                let marker = if snapshot.channels.contains(&index) { "[x]" } else { "[ ]" };
                row.push(
                    button(text(format!("{} {}", marker, name)).size(12))
                        .on_press(Message::ToggleChannel(index))
                        .padding(4),
                )
            },
        );

        let seek = row![
            text("Seek").size(14),
            slider(
                0.0..=snapshot.duration.max(0.1),
                snapshot.position,
                Message::ChannelSeek,
            )
            .step(0.1),
            button("0.5x").on_press(Message::ChannelSpeed(0.5)).padding(6),
            button("1x").on_press(Message::ChannelSpeed(1.0)).padding(6),
            button("2x").on_press(Message::ChannelSpeed(2.0)).padding(6),
            text(format!("{:.1}x", snapshot.speed)).size(14),
            button("Chunk -").on_press(Message::ChunkDuration(0.5)).padding(6),
            button("Chunk +").on_press(Message::ChunkDuration(2.0)).padding(6),
        ]
        .spacing(8)
        .align_y(Alignment::Center);

        let kind_options: Element<'_, Message> = match snapshot.kind {
            ViewerKind::Polar => [PolarMode::Fixed, PolarMode::Dynamic]
                .into_iter()
                .fold(Row::new().spacing(6), |row, mode| {
                    row.push(
                        button(if mode == PolarMode::Fixed { "Fixed" } else { "Dynamic" })
                            .on_press_maybe(
                                (mode != snapshot.polar_mode).then_some(Message::SelectPolarMode(mode)),
                            )
                            .padding(6),
                    )
                })
                .into(),
            ViewerKind::Recurrence => {
                let (x, y) = snapshot.recurrence_pair;
                let count = snapshot.channel_count.max(1);
                let colormaps = Colormap::ALL
                    .into_iter()
                    .fold(Row::new().spacing(4), |row, colormap| {
                        row.push(
                            button(text(format!("{:?}", colormap)).size(12))
                                .on_press_maybe(
                                    (colormap != snapshot.colormap)
                                        .then_some(Message::SelectColormap(colormap)),
                                )
                                .padding(4),
                        )
                    });
                column![
                    row![
                        text(format!("X: ch {}  Y: ch {}", x + 1, y + 1)).size(14),
                        button("Next X")
                            .on_press(Message::RecurrencePair((x + 1) % count, y))
                            .padding(6),
                        button("Next Y")
                            .on_press(Message::RecurrencePair(x, (y + 1) % count))
                            .padding(6),
                    ]
                    .spacing(8)
                    .align_y(Alignment::Center),
                    colormaps,
                ]
                .spacing(6)
                .into()
            }
            _ => Row::new().into(),
        };

        let undersample_value = snapshot
            .undersample_slider
            .or(snapshot.undersample_applied)
            .unwrap_or(64);
        let undersample = row![
            text(match snapshot.undersample_applied {
                Some(frequency) => format!("Undersampled at {} Hz", frequency),
                None => "Native rate".to_string(),
            })
            .size(14),
            slider(8..=512, undersample_value, Message::UndersampleChanged).step(8u32),
            button("Native").on_press(Message::ClearUndersample).padding(6),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let chart: Element<'_, Message> = match &snapshot.frame {
            Some(frame) => column![
                text(frame.current_time.clone()).size(14),
                Canvas::new(ChannelChart::new(&frame.traces))
                    .width(Length::Fill)
                    .height(Length::Fixed(320.0)),
            ]
            .spacing(6)
            .into(),
            None => text("No frame yet").size(14).into(),
        };

        let mut page = column![
            intake,
            text(summary).size(16),
            transport,
            seek,
            kinds,
            kind_options,
            toggles,
            undersample
        ]
        .spacing(10);
        if let Some(err) = &snapshot.last_error {
            page = page.push(
                row![
                    text(format!("Error: {}", err)).size(14),
                    button("Dismiss").on_press(Message::DismissError).padding(4),
                ]
                .spacing(8),
            );
        }
        page.push(chart).into()
    }
}

fn tab_button(label: &str, tab: Tab, current: Tab) -> Element<'_, Message> {
    button(text(label).size(16))
        .on_press_maybe((tab != current).then_some(Message::SelectTab(tab)))
        .padding(8)
        .into()
}

fn kind_label(kind: ViewerKind) -> &'static str {
    match kind {
        ViewerKind::Continuous => "Continuous",
        ViewerKind::Xor => "XOR",
        ViewerKind::Polar => "Polar",
        ViewerKind::Recurrence => "Recurrence",
    }
}

fn metrics_line(metrics: &MetricsSnapshot) -> String {
    [
        ("analyze", RequestKind::Analyze),
        ("chunk", RequestKind::Chunk),
        ("recompute", RequestKind::Recompute),
        ("graph", RequestKind::Graph),
    ]
    .into_iter()
    .map(|(name, kind)| {
        let counters = metrics.counters(kind);
        format!(
            "{} {}/{} ({} stale, {} failed)",
            name, counters.applied, counters.issued, counters.stale, counters.failed
        )
    })
    .chain(std::iter::once(format!(
        "chunks in flight {} (peak {})",
        metrics.outstanding_chunks, metrics.peak_outstanding_chunks
    )))
    .collect::<Vec<_>>()
    .join(" | ")
}

fn prediction_banner(prediction: &DopplerPrediction) -> String {
    format!(
        "Predicted start {:.2} m/s ({:.2} km/h), end {:.2} m/s ({:.2} km/h), source {:.2} Hz",
        prediction.start_speed,
        prediction.start_kmh(),
        prediction.end_speed,
        prediction.end_kmh(),
        prediction.source_frequency
    )
}

fn status_label(status: &PlaybackStatus) -> String {
    match status {
        PlaybackStatus::Playing => "playing".into(),
        PlaybackStatus::Stopped => "stopped".into(),
        PlaybackStatus::Error(err) => format!("error: {}", err),
    }
}

fn viewer_panel(frame: ViewerFrame<'_>) -> Element<'_, Message> {
    let slot = frame.slot;
    let banner = match frame.prediction() {
        Some((label, Some(confidence))) => format!("{}: {:.0}%", label, confidence * 100.0),
        Some((label, None)) => label.to_string(),
        None => "No prediction".into(),
    };
    let controls = row![
        button("Start").on_press(Message::Start(slot)).padding(6),
        button("Pause").on_press(Message::Pause(slot)).padding(6),
        button("Restart").on_press(Message::Restart(slot)).padding(6),
        text(format!(
            "{} at {:.0}",
            status_label(frame.status),
            frame.playback.position
        ))
        .size(12),
    ]
    .spacing(6)
    .align_y(Alignment::Center);

    let waveform = Canvas::new(WaveformChart {
        time: frame.time(),
        amplitude: frame.amplitude(),
        zoom: frame.zoom,
    })
    .width(Length::Fill)
    .height(Length::Fixed(220.0));

    let mut panel = column![
        text(frame.label).size(20),
        text(banner).size(18),
        controls,
        waveform,
    ]
    .spacing(8)
    .width(Length::Fill);
    if let Some(spectrogram) = frame.spectrogram() {
        panel = panel.push(text("Spectrogram").size(14)).push(
            Canvas::new(SpectrogramChart {
                spectrogram,
                zoom: frame.zoom,
            })
            .width(Length::Fill)
            .height(Length::Fixed(180.0)),
        );
    }
    panel.into()
}
