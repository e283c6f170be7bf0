use crate::error::GalleryError;
use std::future::Future;

/// Two-phase local update: snapshot `state`, apply the change, then await `commit`.
/// On failure the snapshot is restored and the error returned.
///
/// `commit` is lazy, so nothing reaches the backend before the local change is applied.
pub async fn apply_optimistic<S, T, Fut>(
    state: &mut S,
    apply: impl FnOnce(&mut S),
    commit: Fut,
) -> Result<T, GalleryError>
where
    S: Clone,
    Fut: Future<Output = Result<T, GalleryError>>,
{
    let snapshot = state.clone();
    apply(state);
    match commit.await {
        Ok(value) => Ok(value),
        Err(e) => {
            *state = snapshot;
            Err(e)
        }
    }
}
