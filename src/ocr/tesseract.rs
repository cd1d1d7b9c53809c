//! tesseract CLI連携モジュール
//!
//! `tesseract <image> stdout -l <lang>` を子プロセスとして実行し、
//! 標準出力を認識テキストとして受け取る。

use super::Recognizer;
use allergen_scan_common::RecognitionFailure;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct TesseractCli {
    command: String,
    language: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new<C: Into<String>, L: Into<String>>(command: C, language: L, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
            timeout,
        }
    }
}

impl Recognizer for TesseractCli {
    async fn recognize(&self, image: &Path) -> Result<String, RecognitionFailure> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .kill_on_drop(true);

        tracing::debug!(command = %self.command, image = %image.display(), "running OCR");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => return Err(RecognitionFailure::TimedOut(self.timeout.as_secs())),
            Ok(Err(e)) => {
                return Err(RecognitionFailure::Unavailable(format!(
                    "{}: {}",
                    self.command, e
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionFailure::Failed(format!(
                "{} ({})",
                stderr.trim(),
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
