mod record;

pub use record::{STATE_MAGIC, STATE_VERSION, ScanStateRecord};

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, ScanError};

/// State file location inside a cache directory
pub fn state_path_in(cache_dir: &Path) -> PathBuf {
    cache_dir.join("scan_state.tss")
}

/// Save the session state
///
/// File format:
/// [4B] Magic "TSCS"
/// [4B] Version (u32 LE)
/// [4B] Record length (u32 LE)
/// [NB] Record (postcard)
/// [4B] CRC32 checksum of all preceding bytes
pub fn save_state(path: &Path, record: &ScanStateRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let body = postcard::to_allocvec(record)
        .map_err(|e| ScanError::StateStore(format!("Failed to serialize state: {e}")))?;

    let mut data = Vec::with_capacity(body.len() + 16);
    data.extend_from_slice(&STATE_MAGIC);
    data.extend_from_slice(&STATE_VERSION.to_le_bytes());
    data.extend_from_slice(&(body.len() as u32).to_le_bytes());
    data.extend_from_slice(&body);
    let checksum = crc32fast::hash(&data);
    data.extend_from_slice(&checksum.to_le_bytes());

    // temp file then rename, a reader never sees a half-written file
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(&data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Load the session state written by [`save_state`]
pub fn load_state(path: &Path) -> Result<ScanStateRecord> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;

    // magic(4) + version(4) + len(4) + checksum(4)
    if data.len() < 16 {
        return Err(ScanError::StateStore("State file too small".to_string()));
    }

    let checksum_offset = data.len() - 4;
    let stored = read_u32(&data, checksum_offset)?;
    if stored != crc32fast::hash(&data[..checksum_offset]) {
        return Err(ScanError::StateStore("State checksum mismatch".to_string()));
    }

    if data[..4] != STATE_MAGIC {
        return Err(ScanError::StateStore("Invalid state magic".to_string()));
    }

    let version = read_u32(&data, 4)?;
    if version != STATE_VERSION {
        return Err(ScanError::StateStore(format!(
            "State version mismatch: expected {STATE_VERSION}, got {version}"
        )));
    }

    let len = read_u32(&data, 8)? as usize;
    let start = 12;
    if start + len > checksum_offset {
        return Err(ScanError::StateStore("Invalid record length".to_string()));
    }

    postcard::from_bytes(&data[start..start + len])
        .map_err(|e| ScanError::StateStore(format!("Failed to deserialize state: {e}")))
}

/// Load the state, treating a missing file as a stopped session
pub fn load_or_stopped(path: &Path) -> Result<ScanStateRecord> {
    match load_state(path) {
        Err(ScanError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(ScanStateRecord::stopped())
        }
        other => other,
    }
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| ScanError::StateStore("Truncated state file".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::ScanState;
    use crate::types::{ScanMode, SourceCategory};
    use tempfile::TempDir;

    fn running_record() -> ScanStateRecord {
        ScanStateRecord {
            state: ScanState::Running,
            mode: Some(ScanMode::Auto),
            source: Some(SourceCategory::MixedAdtv),
            number_search: false,
            channel_count: 12,
            ..ScanStateRecord::stopped()
        }
    }

    #[test]
    fn test_save_load_state() {
        let temp = TempDir::new().unwrap();
        let path = state_path_in(temp.path());
        let record = running_record();

        save_state(&path, &record).unwrap();
        let loaded = load_state(&path).unwrap();

        assert_eq!(loaded, record);
        assert!(loaded.was_interrupted());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_state_rejected() {
        let temp = TempDir::new().unwrap();
        let path = state_path_in(temp.path());
        save_state(&path, &running_record()).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[13] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        let err = load_state(&path).unwrap_err();
        assert!(matches!(err, ScanError::StateStore(msg) if msg.contains("checksum")));
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("other.bin");
        let mut data = b"NOPE".to_vec();
        data.extend_from_slice(&STATE_VERSION.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        let checksum = crc32fast::hash(&data);
        data.extend_from_slice(&checksum.to_le_bytes());
        fs::write(&path, &data).unwrap();

        assert!(matches!(load_state(&path), Err(ScanError::StateStore(_))));
    }

    #[test]
    fn test_missing_file_is_stopped() {
        let temp = TempDir::new().unwrap();
        let record = load_or_stopped(&state_path_in(temp.path())).unwrap();
        assert_eq!(record.state, ScanState::Stopped);
        assert!(!record.was_interrupted());
    }
}
