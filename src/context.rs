use crate::config::RuntimeSettings;
use crate::core::command::{CommandRunner, SystemRunner};
use crate::core::notifications::NotificationChannel;
use std::sync::Arc;

#[derive(Clone)]
pub struct RunContext {
    pub settings: Arc<RuntimeSettings>,
    pub runner: Arc<dyn CommandRunner>,
    pub notifier: Option<Arc<dyn NotificationChannel>>,
}

impl RunContext {
    pub fn new(settings: RuntimeSettings) -> Self {
        Self::with_runner(settings, Arc::new(SystemRunner))
    }

    pub fn with_runner(settings: RuntimeSettings, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            settings: Arc::new(settings),
            runner,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Option<Arc<dyn NotificationChannel>>) -> Self {
        self.notifier = notifier;
        self
    }
}
