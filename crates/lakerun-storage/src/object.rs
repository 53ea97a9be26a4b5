//! Object upload and download against a branch or ref.

use bytes::Bytes;
use lakerun_client::VersionedStoreClient;
use lakerun_types::{validate_object_path, ObjectStats};
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Upload `payload` to `key` on `branch`, replacing any existing object.
///
/// The object is staged on the branch; it is not committed.
pub async fn write_object<C>(
    client: &C,
    repository: &str,
    branch: &str,
    key: &str,
    payload: Bytes,
) -> StorageResult<ObjectStats>
where
    C: VersionedStoreClient + ?Sized,
{
    validate_object_path(key).map_err(StorageError::InvalidKey)?;
    let size = payload.len();
    let stats = client
        .put_object(repository, branch, key, payload)
        .await
        .map_err(|source| StorageError::Write {
            repository: repository.to_string(),
            branch: branch.to_string(),
            key: key.to_string(),
            source,
        })?;
    debug!(repository, branch, key, size, checksum = %stats.checksum, "object written");
    Ok(stats)
}

/// Download the object at `key` as of `reference` (a branch name or commit id).
pub async fn read_object<C>(
    client: &C,
    repository: &str,
    reference: &str,
    key: &str,
) -> StorageResult<Bytes>
where
    C: VersionedStoreClient + ?Sized,
{
    validate_object_path(key).map_err(StorageError::InvalidKey)?;
    let payload = client
        .get_object(repository, reference, key)
        .await
        .map_err(|source| {
            if source.is_not_found() {
                StorageError::NotFound {
                    repository: repository.to_string(),
                    reference: reference.to_string(),
                    key: key.to_string(),
                    source,
                }
            } else {
                StorageError::Read {
                    repository: repository.to_string(),
                    reference: reference.to_string(),
                    key: key.to_string(),
                    source,
                }
            }
        })?;
    debug!(repository, reference, key, size = payload.len(), "object read");
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use lakerun_client::{CallKind, ClientError, InMemoryStoreClient};

    fn store() -> InMemoryStoreClient {
        InMemoryStoreClient::new().with_repository("example", "main").unwrap()
    }

    #[tokio::test]
    async fn write_then_read_returns_same_bytes() {
        let client = store();
        let payload = Bytes::from_static(b"\x00\x01\x02");
        let stats = write_object(&client, "example", "main", "a/b.bin", payload).await.unwrap();
        assert_eq!(stats.path, "a/b.bin");
        assert_eq!(stats.size_bytes, 3);

        let back = read_object(&client, "example", "main", "a/b.bin").await.unwrap();
        assert_eq!(&back[..], b"\x00\x01\x02");
    }

    #[tokio::test]
    async fn empty_payload_round_trips() {
        let client = store();
        write_object(&client, "example", "main", "empty", Bytes::new()).await.unwrap();
        let back = read_object(&client, "example", "main", "empty").await.unwrap();
        assert!(back.is_empty());
    }

    #[tokio::test]
    async fn later_write_replaces_earlier() {
        let client = store();
        write_object(&client, "example", "main", "k", Bytes::from_static(b"one")).await.unwrap();
        write_object(&client, "example", "main", "k", Bytes::from_static(b"two")).await.unwrap();
        let back = read_object(&client, "example", "main", "k").await.unwrap();
        assert_eq!(&back[..], b"two");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let client = store();
        let err = read_object(&client, "example", "main", "never/written").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn invalid_key_makes_no_remote_call() {
        let client = store();
        let err = write_object(&client, "example", "main", "/abs", Bytes::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidKey);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn transport_failures_keep_their_direction() {
        let client = store();
        client.fail_next(CallKind::PutObject, ClientError::Transport("reset".into()));
        let err = write_object(&client, "example", "main", "k", Bytes::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);

        client.fail_next(CallKind::GetObject, ClientError::Transport("reset".into()));
        let err = read_object(&client, "example", "main", "k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Read);
        assert!(err.is_retryable());
    }
}
