use config::Settings;
use model::TranscribeAdapter;
use router::StrategyRouter;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<StrategyRouter>,
    pub model: Arc<TranscribeAdapter>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let settings = Arc::new(settings);

        let fetcher = Arc::new(model::HfHubFetcher::new(&settings.models_dir));
        let model = Arc::new(TranscribeAdapter::new(fetcher, &settings.models_dir));
        let dispatcher = Arc::new(dispatch::Dispatcher::new(settings.global_transcribe_limit()));
        let optimizer = Arc::new(concurrency::ConcurrencyOptimizer::new(settings.concurrency.clone()));

        let router = Arc::new(StrategyRouter::new(
            model.clone(),
            dispatcher,
            optimizer,
            settings.audio_slice.clone(),
            settings.concurrency.default_max_concurrent,
        ));

        Self { router, model, settings }
    }
}
