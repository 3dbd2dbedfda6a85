use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::Result;
use traced_api::{
    api::{
        middlewares::{RequestTracer, DEFAULT_FLUSH_TIMEOUT},
        Api,
    },
    config::Config,
    telemetry::{Flush, FlushError},
};

#[derive(Default)]
pub struct CountingFlusher(AtomicUsize);

impl Flush for CountingFlusher {
    fn flush(&self) -> Result<(), FlushError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestApp {
    pub address: String,
    flusher: Arc<CountingFlusher>,
}

impl TestApp {
    pub fn flushes(&self) -> usize {
        self.flusher.0.load(Ordering::SeqCst)
    }
}

pub async fn spawn_app() -> Result<TestApp> {
    let configuration = {
        let mut configuration = Config::build()?;
        configuration.application.host = "127.0.0.1".to_string();
        configuration.application.port = 0;
        configuration
    };

    let flusher = Arc::new(CountingFlusher::default());
    let tracer = RequestTracer::new(flusher.clone(), DEFAULT_FLUSH_TIMEOUT);

    let api = Api::build(&configuration, tracer)
        .await
        .expect("Failed to build application.");
    let port = api.port();
    let address = format!("http://127.0.0.1:{}", port);
    let _ = tokio::spawn(api.run_until_stopped());

    Ok(TestApp { address, flusher })
}
