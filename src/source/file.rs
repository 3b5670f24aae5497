use crate::{
    errors::FetchError,
    source::{Fetcher, Origin},
};
use std::{
    fs::File,
    io,
    io::{Read, Write},
    time::{Duration, Instant},
};

const CHUNK_SIZE: usize = 64 * 1024;

/// Copies source images from a local or mounted filesystem
///
/// The deadline is checked between chunks, so a stalled read on a network
/// mount can overrun it by at most one read call.
#[derive(Clone, Debug)]
pub struct FileFetcher {
    timeout: Duration,
}

impl FileFetcher {
    pub fn new(timeout: Duration) -> Self {
        FileFetcher { timeout }
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, origin: &Origin, dest: &mut dyn Write) -> Result<u64, FetchError> {
        let path = match origin {
            Origin::Path(path) => path,
            Origin::Url(_) => return Err(FetchError::UnsupportedOrigin(origin.to_string())),
        };
        let deadline = Instant::now() + self.timeout;
        let mut source = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(FetchError::NotFound),
            Err(err) => return Err(err.into()),
        };

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            if Instant::now() >= deadline {
                return Err(FetchError::Timeout(self.timeout));
            }
            let len = match source.read(&mut buffer) {
                Ok(0) => break,
                Ok(len) => len,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            dest.write_all(&buffer[..len])?;
            total += len as u64;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn copy_large_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.tif");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let mut sink = Vec::new();
        let len = FileFetcher::new(Duration::from_secs(10))
            .fetch(&Origin::Path(path), &mut sink)
            .unwrap();
        assert_eq!(len, data.len() as u64);
        assert_eq!(sink, data);
    }

    #[test]
    fn missing_origin() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = Vec::new();
        assert!(matches!(
            FileFetcher::new(Duration::from_secs(1))
                .fetch(&Origin::Path(dir.path().join("nope.tif")), &mut sink),
            Err(FetchError::NotFound)
        ));
    }

    #[test]
    fn expired_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.tif");
        std::fs::write(&path, b"data").unwrap();
        let mut sink = Vec::new();
        match FileFetcher::new(Duration::from_secs(0)).fetch(&Origin::Path(path), &mut sink) {
            Err(FetchError::Timeout(timeout)) => assert_eq!(timeout, Duration::from_secs(0)),
            other => panic!("unexpected {:?}", other),
        }
    }
}
