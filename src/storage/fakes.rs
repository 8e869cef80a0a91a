//! Hand-rolled fakes for the storage seams.

use super::{Bucket, BucketAdmin, ObjectReader, ObjectWrite, ObjectWriter, RemoteObject, Version};
use crate::archive::{ArchiveFile, Archiver, EntryHandler};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use std::io::{self, Read, Write};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pub fn io_error(message: &str) -> StorageError {
    StorageError::Io(io::Error::new(io::ErrorKind::Other, message.to_string()))
}

/// How `new_reader` should fail, if at all.
#[derive(Debug, Clone)]
pub enum ReaderFailure {
    NotFound,
    Io(String),
}

/// Records what went through a `FakeWriter`.
#[derive(Debug, Default)]
pub struct WriterLog {
    pub bytes: Mutex<Vec<u8>>,
    pub shutdown_calls: AtomicUsize,
    pub abort_calls: AtomicUsize,
}

struct FakeWriter {
    log: Arc<WriterLog>,
    shutdown_error: Option<String>,
}

impl AsyncWrite for FakeWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.log.bytes.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.log.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        match &self.shutdown_error {
            Some(message) => Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, message.clone()))),
            None => Poll::Ready(Ok(())),
        }
    }
}

#[async_trait]
impl ObjectWrite for FakeWriter {
    async fn abort(&mut self) -> Result<()> {
        self.log.abort_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeReader {
    inner: io::Cursor<Vec<u8>>,
    drops: Arc<AtomicUsize>,
}

impl AsyncRead for FakeReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for FakeReader {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeObject {
    pub version: Mutex<Version>,
    pub version_error: Mutex<Option<String>>,
    pub version_calls: AtomicUsize,

    pub reader_data: Mutex<Vec<u8>>,
    pub reader_failure: Mutex<Option<ReaderFailure>>,
    pub new_reader_calls: AtomicUsize,
    pub reader_drops: Arc<AtomicUsize>,

    pub new_writer_calls: AtomicUsize,
    pub writer_shutdown_error: Mutex<Option<String>>,
    pub writer: Arc<WriterLog>,
}

impl FakeObject {
    pub fn with_version(version: Version) -> Self {
        let object = Self::default();
        *object.version.lock().unwrap() = version;
        object
    }

    pub fn fail_version(&self, message: &str) {
        *self.version_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_reader(&self, failure: ReaderFailure) {
        *self.reader_failure.lock().unwrap() = Some(failure);
    }

    pub fn fail_shutdown(&self, message: &str) {
        *self.writer_shutdown_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn shutdown_calls(&self) -> usize {
        self.writer.shutdown_calls.load(Ordering::SeqCst)
    }

    pub fn abort_calls(&self) -> usize {
        self.writer.abort_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteObject for FakeObject {
    async fn new_reader(&self) -> Result<ObjectReader> {
        self.new_reader_calls.fetch_add(1, Ordering::SeqCst);
        match self.reader_failure.lock().unwrap().clone() {
            Some(ReaderFailure::NotFound) => Err(StorageError::ObjectNotFound),
            Some(ReaderFailure::Io(message)) => Err(io_error(&message)),
            None => Ok(Box::new(FakeReader {
                inner: io::Cursor::new(self.reader_data.lock().unwrap().clone()),
                drops: self.reader_drops.clone(),
            })),
        }
    }

    fn new_writer(&self) -> ObjectWriter {
        self.new_writer_calls.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeWriter {
            log: self.writer.clone(),
            shutdown_error: self.writer_shutdown_error.lock().unwrap().clone(),
        })
    }

    async fn version(&self) -> Result<Version> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.version_error.lock().unwrap().clone() {
            return Err(io_error(&message));
        }
        Ok(self.version.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeBucket {
    pub objects: Mutex<Vec<Arc<dyn RemoteObject>>>,
    pub list_error: Mutex<Option<String>>,
}

impl FakeBucket {
    pub fn with_objects(objects: Vec<Arc<dyn RemoteObject>>) -> Self {
        Self {
            objects: Mutex::new(objects),
            list_error: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Bucket for FakeBucket {
    async fn list_objects(&self) -> Result<Vec<Arc<dyn RemoteObject>>> {
        if let Some(message) = self.list_error.lock().unwrap().clone() {
            return Err(io_error(&message));
        }
        Ok(self.objects.lock().unwrap().clone())
    }
}

/// Bucket registry kept in memory; records every creation.
#[derive(Default)]
pub struct FakeBucketAdmin {
    pub buckets: Mutex<Vec<String>>,
    pub created: Mutex<Vec<String>>,
    pub lookup_error: Mutex<Option<String>>,
    pub create_error: Mutex<Option<String>>,
}

impl FakeBucketAdmin {
    pub fn with_buckets(names: &[&str]) -> Self {
        let admin = Self::default();
        *admin.buckets.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
        admin
    }

    pub fn fail_lookup(&self, message: &str) {
        *self.lookup_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_create(&self, message: &str) {
        *self.create_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl BucketAdmin for FakeBucketAdmin {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        if let Some(message) = self.lookup_error.lock().unwrap().clone() {
            return Err(StorageError::Bucket(message));
        }
        Ok(self.buckets.lock().unwrap().iter().any(|b| b == bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        if let Some(message) = self.create_error.lock().unwrap().clone() {
            return Err(StorageError::Bucket(message));
        }
        self.buckets.lock().unwrap().push(bucket.to_string());
        self.created.lock().unwrap().push(bucket.to_string());
        Ok(())
    }
}

/// Archiver that records its inputs instead of producing a real archive.
#[derive(Default)]
pub struct FakeArchiver {
    pub archive_calls: AtomicUsize,
    pub archived_names: Mutex<Vec<String>>,
    pub archive_error: Mutex<Option<String>>,

    pub extract_calls: AtomicUsize,
    pub extracted_bytes: Mutex<Vec<u8>>,
    pub extract_error: Mutex<Option<String>>,
}

impl FakeArchiver {
    pub fn archive_calls(&self) -> usize {
        self.archive_calls.load(Ordering::SeqCst)
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

impl Archiver for FakeArchiver {
    fn archive(&self, output: &mut dyn Write, files: &[ArchiveFile]) -> Result<()> {
        self.archive_calls.fetch_add(1, Ordering::SeqCst);
        *self.archived_names.lock().unwrap() =
            files.iter().map(|f| f.name_in_archive.clone()).collect();

        // Some bytes make it out before any failure
        output.write_all(b"partial-archive")?;
        if let Some(message) = self.archive_error.lock().unwrap().clone() {
            return Err(io_error(&message));
        }
        Ok(())
    }

    fn extract(
        &self,
        input: &mut dyn Read,
        _paths: Option<&[String]>,
        _handler: &mut EntryHandler<'_>,
    ) -> Result<()> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        *self.extracted_bytes.lock().unwrap() = bytes;
        if let Some(message) = self.extract_error.lock().unwrap().clone() {
            return Err(io_error(&message));
        }
        Ok(())
    }
}
