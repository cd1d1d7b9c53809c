//! 文字認識（OCR）連携
//!
//! OCRエンジン自体は外部サービスとして扱い、画像パスからテキストを返す
//! [`Recognizer`] だけを定義する。完了順の管理は `Session` 側で行う。

pub mod cache;
mod tesseract;

pub use cache::OcrCache;
pub use tesseract::TesseractCli;

use allergen_scan_common::{RecognitionFailure, ScanTicket};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 画像からテキストを読み取るサービス
pub trait Recognizer: Send + Sync {
    fn recognize(
        &self,
        image: &Path,
    ) -> impl Future<Output = Result<String, RecognitionFailure>> + Send;
}

/// バックグラウンドで実行したスキャンの完了通知
#[derive(Debug)]
pub struct ScanCompletion {
    pub ticket: ScanTicket,
    pub image: PathBuf,
    pub result: Result<String, RecognitionFailure>,
}

/// スキャンを別タスクで実行し、完了を `tx` に送る
///
/// 受信側が先に閉じられていた場合、結果は捨てられる。
pub fn spawn_scan<R>(
    recognizer: Arc<R>,
    image: PathBuf,
    ticket: ScanTicket,
    tx: mpsc::UnboundedSender<ScanCompletion>,
) -> JoinHandle<()>
where
    R: Recognizer + 'static,
{
    tokio::spawn(async move {
        let result = recognizer.recognize(&image).await;
        if tx
            .send(ScanCompletion {
                ticket,
                image,
                result,
            })
            .is_err()
        {
            tracing::debug!(seq = ticket.seq(), "scan receiver dropped");
        }
    })
}

/// キャッシュ付きのOCR
///
/// 画像のあるフォルダごとに `.ocr-cache.json` を持つ。
/// 内容を保存するには [`CachedRecognizer::save`] を呼ぶ。
pub struct CachedRecognizer<R> {
    inner: R,
    language: String,
    caches: Mutex<HashMap<PathBuf, OcrCache>>,
}

impl<R: Recognizer> CachedRecognizer<R> {
    pub fn new<L: Into<String>>(inner: R, language: L) -> Self {
        Self {
            inner,
            language: language.into(),
            caches: Mutex::new(HashMap::new()),
        }
    }

    fn folder_of(image: &Path) -> PathBuf {
        image
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn lookup(&self, folder: &Path, key: &str) -> Option<String> {
        let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        caches
            .entry(folder.to_path_buf())
            .or_insert_with(|| OcrCache::load(folder))
            .get(key)
            .map(str::to_string)
    }

    fn store(&self, folder: &Path, key: String, image: &Path, size: u64, text: String) {
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        caches
            .entry(folder.to_path_buf())
            .or_insert_with(|| OcrCache::load(folder))
            .insert(key, file_name, size, text);
    }

    /// 読み込んだ全フォルダのキャッシュを保存
    pub fn save(&self) -> crate::error::Result<()> {
        let caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        for (folder, cache) in caches.iter() {
            cache.save(folder)?;
        }
        Ok(())
    }
}

impl<R: Recognizer> Recognizer for CachedRecognizer<R> {
    async fn recognize(&self, image: &Path) -> Result<String, RecognitionFailure> {
        let bytes = match tokio::fs::read(image).await {
            Ok(bytes) => bytes,
            // 読めない画像はキャッシュせずそのまま渡す
            Err(_) => return self.inner.recognize(image).await,
        };

        let folder = Self::folder_of(image);
        let key = cache::cache_key(&bytes, &self.language);

        if let Some(text) = self.lookup(&folder, &key) {
            tracing::debug!(image = %image.display(), "OCR cache hit");
            return Ok(text);
        }

        let text = self.inner.recognize(image).await?;
        self.store(&folder, key, image, bytes.len() as u64, text.clone());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRecognizer {
        calls: AtomicUsize,
    }

    impl Recognizer for CountingRecognizer {
        async fn recognize(&self, _image: &Path) -> Result<String, RecognitionFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Ingrediënten: MELK-\npoeder".to_string())
        }
    }

    #[tokio::test]
    async fn test_cached_recognizer_hits_cache_on_second_call() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("label.jpg");
        std::fs::write(&image, b"fake jpeg bytes").unwrap();

        let recognizer = CachedRecognizer::new(
            CountingRecognizer {
                calls: AtomicUsize::new(0),
            },
            "nld",
        );

        let first = recognizer.recognize(&image).await.unwrap();
        let second = recognizer.recognize(&image).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(recognizer.inner.calls.load(Ordering::SeqCst), 1);

        recognizer.save().unwrap();
        assert_eq!(OcrCache::load(dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_scan_sends_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let recognizer = Arc::new(CountingRecognizer {
            calls: AtomicUsize::new(0),
        });
        let mut session = allergen_scan_common::Session::new(None);
        let ticket = session.begin_scan();

        spawn_scan(recognizer, PathBuf::from("label.jpg"), ticket, tx)
            .await
            .unwrap();

        let completion = rx.recv().await.unwrap();
        assert_eq!(completion.ticket, ticket);
        assert_eq!(completion.image, PathBuf::from("label.jpg"));
        assert!(completion.result.is_ok());
    }
}
