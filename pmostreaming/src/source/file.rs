//! Source locale : un fichier dont la longueur est connue d'avance

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use pmoutils::Guarded;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{AudioStreamSource, AudioStreamSourceDelegate, DelegateSlot};
use crate::error::{Error, Result};
use crate::parsers::AudioFileType;

/// Source lisant un fichier par morceaux dans une tâche tokio.
///
/// Les lectures sont lancées sur le runtime de l'appel à [`open`](Self::open),
/// `seek` peut donc être appelé depuis n'importe quel thread.
pub struct FileAudioSource {
    path: PathBuf,
    id: String,
    length: u64,
    file_type: AudioFileType,
    chunk_size: usize,
    delegate: DelegateSlot,
    reader: Guarded<Option<CancellationToken>>,
    runtime: Handle,
    position: AtomicU64,
    closed: AtomicBool,
    me: Weak<FileAudioSource>,
}

impl FileAudioSource {
    /// Ouvre `path` ; la longueur est lue immédiatement
    pub async fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        let length = tokio::fs::metadata(&path).await?.len();
        let file_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(AudioFileType::from_extension)
            .unwrap_or_default();
        debug!(path = %path.display(), length, %file_type, "Opening file source");

        Ok(Arc::new_cyclic(|me| Self {
            id: path.to_string_lossy().into_owned(),
            path,
            length,
            file_type,
            chunk_size: chunk_size.max(1),
            delegate: DelegateSlot::default(),
            reader: Guarded::new(None),
            runtime: Handle::current(),
            position: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            me: me.clone(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stop_reader(&self) {
        if let Some(token) = self.reader.replace(None) {
            token.cancel();
        }
    }

    fn report_error(&self, error: Error) {
        warn!(path = %self.path.display(), error = %error, "File source failed");
        if let Some(delegate) = self.delegate.get() {
            delegate.error_occurred(self, error);
        }
    }
}

async fn read_file(source: Weak<FileAudioSource>, offset: u64, token: CancellationToken) {
    let Some(path) = source.upgrade().map(|s| s.path.clone()) else {
        return;
    };
    let result = tokio::select! {
        _ = token.cancelled() => return,
        result = read_chunks(&source, &path, offset, &token) => result,
    };

    let Some(current) = source.upgrade() else {
        return;
    };
    if token.is_cancelled() {
        return;
    }
    match result {
        Ok(()) => {
            trace!(path = %path.display(), "End of file reached");
            if let Some(delegate) = current.delegate.get() {
                delegate.end_of_file_occurred(current.as_ref());
            }
        }
        Err(err) => current.report_error(err),
    }
}

async fn read_chunks(
    source: &Weak<FileAudioSource>,
    path: &Path,
    offset: u64,
    token: &CancellationToken,
) -> Result<()> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let chunk_size = source.upgrade().map(|s| s.chunk_size).unwrap_or(1);
    let mut buffer = vec![0u8; chunk_size];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            return Ok(());
        }
        if token.is_cancelled() {
            return Ok(());
        }
        let Some(current) = source.upgrade() else {
            return Ok(());
        };
        current.position.fetch_add(read as u64, Ordering::SeqCst);
        if let Some(delegate) = current.delegate.get() {
            delegate.data_available(current.as_ref(), Bytes::copy_from_slice(&buffer[..read]));
        }
        // Laisse les autres tâches avancer entre deux morceaux
        tokio::task::yield_now().await;
    }
}

impl AudioStreamSource for FileAudioSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_delegate(&self, delegate: Weak<dyn AudioStreamSourceDelegate>) {
        self.delegate.set(delegate);
    }

    fn remove_delegate(&self) {
        self.delegate.clear();
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek(&self, offset: u64) {
        let offset = offset.min(self.length);
        let token = CancellationToken::new();
        let started = self.reader.write(|reader| {
            if self.closed.load(Ordering::SeqCst) {
                return false;
            }
            if let Some(previous) = reader.replace(token.clone()) {
                previous.cancel();
            }
            self.position.store(offset, Ordering::SeqCst);
            true
        });
        if !started {
            return;
        }
        trace!(path = %self.path.display(), offset, "Reading file");
        self.runtime.spawn(read_file(self.me.clone(), offset, token));
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.stop_reader();
        }
    }

    fn audio_file_type(&self) -> AudioFileType {
        self.file_type
    }
}

impl Drop for FileAudioSource {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tokio::sync::mpsc;

    enum Seen {
        Data(Bytes),
        End,
        Error,
    }

    struct Recorder(mpsc::UnboundedSender<Seen>);

    impl AudioStreamSourceDelegate for Recorder {
        fn data_available(&self, _source: &dyn AudioStreamSource, data: Bytes) {
            let _ = self.0.send(Seen::Data(data));
        }
        fn error_occurred(&self, _source: &dyn AudioStreamSource, _error: Error) {
            let _ = self.0.send(Seen::Error);
        }
        fn end_of_file_occurred(&self, _source: &dyn AudioStreamSource) {
            let _ = self.0.send(Seen::End);
        }
        fn metadata_received(&self, _metadata: HashMap<String, String>) {}
    }

    async fn read_all(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Vec<u8> {
        let mut bytes = Vec::new();
        while let Some(seen) = rx.recv().await {
            match seen {
                Seen::Data(chunk) => bytes.extend_from_slice(&chunk),
                Seen::End => break,
                Seen::Error => panic!("unexpected error"),
            }
        }
        bytes
    }

    #[tokio::test]
    async fn test_reads_whole_file_then_eof() {
        let mut file = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        let content: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        file.write_all(&content).unwrap();

        let source = FileAudioSource::open(file.path(), 1024).await.unwrap();
        assert_eq!(source.length(), 5000);
        assert_eq!(source.audio_file_type(), AudioFileType::Mp3);
        assert!(source.supports_seek());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let recorder: Arc<dyn AudioStreamSourceDelegate> = Arc::new(Recorder(tx));
        source.set_delegate(Arc::downgrade(&recorder));
        source.seek(0);

        assert_eq!(read_all(&mut rx).await, content);
        assert_eq!(source.position(), 5000);
    }

    #[tokio::test]
    async fn test_seek_starts_at_offset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let source = FileAudioSource::open(file.path(), 4).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let recorder: Arc<dyn AudioStreamSourceDelegate> = Arc::new(Recorder(tx));
        source.set_delegate(Arc::downgrade(&recorder));
        source.seek(6);

        assert_eq!(read_all(&mut rx).await, b"6789");
    }

    #[tokio::test]
    async fn test_seek_from_a_thread_outside_the_runtime() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abcdefgh").unwrap();

        let source = FileAudioSource::open(file.path(), 3).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let recorder: Arc<dyn AudioStreamSourceDelegate> = Arc::new(Recorder(tx));
        source.set_delegate(Arc::downgrade(&recorder));

        let seeker = source.clone();
        std::thread::spawn(move || seeker.seek(2)).join().unwrap();

        assert_eq!(read_all(&mut rx).await, b"cdefgh");
        assert_eq!(source.position(), 8);
    }

    #[tokio::test]
    async fn test_concurrent_seeks_keep_a_single_reader() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let source = FileAudioSource::open(file.path(), 4).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let recorder: Arc<dyn AudioStreamSourceDelegate> = Arc::new(Recorder(tx));
        source.set_delegate(Arc::downgrade(&recorder));

        // Les lectures ne démarrent qu'une fois tous les seeks passés
        let seekers: Vec<_> = (0..8)
            .map(|_| {
                let source = source.clone();
                std::thread::spawn(move || source.seek(6))
            })
            .collect();
        for seeker in seekers {
            seeker.join().unwrap();
        }

        assert_eq!(read_all(&mut rx).await, b"6789");
        let late = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await;
        assert!(late.is_err(), "a replaced reader kept delivering");
        assert_eq!(source.position(), 10);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileAudioSource::open(dir.path().join("absent.ogg"), 16).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
