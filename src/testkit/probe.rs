//! Scripted HTTP liveness answers.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::port::outbound::HttpProbe;

#[derive(Debug, Default)]
struct Script {
    answers: VecDeque<bool>,
    last: bool,
    calls: usize,
}

/// Answers per URL from a queue; the final answer repeats once the queue
/// drains. Unscripted URLs are never live.
#[derive(Debug, Default)]
pub struct ScriptedHttpProbe {
    scripts: Mutex<HashMap<String, Script>>,
}

impl ScriptedHttpProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sequence(self, url: &str, answers: impl IntoIterator<Item = bool>) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap_or_else(|p| p.into_inner());
            let script = scripts.entry(url.to_string()).or_default();
            script.answers.extend(answers);
        }
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.scripts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(url)
            .map_or(0, |script| script.calls)
    }
}

#[async_trait]
impl HttpProbe for ScriptedHttpProbe {
    async fn is_live(&self, url: &str) -> bool {
        let mut scripts = self.scripts.lock().unwrap_or_else(|p| p.into_inner());
        let script = scripts.entry(url.to_string()).or_default();
        script.calls += 1;
        if let Some(answer) = script.answers.pop_front() {
            script.last = answer;
        }
        script.last
    }
}
