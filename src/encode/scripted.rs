use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::encode::transcode::{EncodeError, Stage, TranscodeSpec, Transcoder};

/// In-process transcoder for tests and dry runs.
///
/// Writes a small placeholder file for each requested output, records every request, and fails
/// the stages it was told to fail.
#[derive(Debug, Default)]
pub struct ScriptedTranscoder {
    failing: HashSet<Stage>,
    skip_output: HashSet<Stage>,
    calls: Mutex<Vec<TranscodeSpec>>,
}

impl ScriptedTranscoder {
    /// Transcoder where every stage succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `stage` exit with a failure status.
    pub fn failing(mut self, stage: Stage) -> Self {
        self.failing.insert(stage);
        self
    }

    /// Make `stage` report success without writing its output.
    pub fn without_output(mut self, stage: Stage) -> Self {
        self.skip_output.insert(stage);
        self
    }

    /// Requests received so far, in call order.
    pub fn calls(&self) -> Vec<TranscodeSpec> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Stages received so far, in call order.
    pub fn stages(&self) -> Vec<Stage> {
        self.calls().iter().map(TranscodeSpec::stage).collect()
    }
}

impl Transcoder for ScriptedTranscoder {
    fn transcode(
        &self,
        spec: &TranscodeSpec,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, EncodeError> {
        let stage = spec.stage();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        spec.check_inputs()?;
        if cancel.is_cancelled() {
            return Err(EncodeError::Cancelled { stage });
        }
        if self.failing.contains(&stage) {
            return Err(EncodeError::Failed {
                stage,
                exit_code: Some(1),
                stderr: format!("scripted {stage} failure"),
            });
        }

        let output = spec.output().to_path_buf();
        if self.skip_output.contains(&stage) {
            return Err(EncodeError::MissingOutput {
                stage,
                path: output,
            });
        }
        std::fs::write(&output, format!("scripted {stage} artifact"))
            .map_err(|source| EncodeError::Spawn { stage, source })?;
        Ok(output)
    }
}
