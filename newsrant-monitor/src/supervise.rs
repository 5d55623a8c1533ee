use anyhow::{anyhow, Result};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Await `unit`, turning a panic inside it into an error.
///
/// The monitor loop wraps each cycle in this so one bad cycle cannot take the
/// process down.
pub async fn contain<F, T>(unit: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(unit).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => Err(anyhow!("cycle panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_ok_and_err() {
        assert_eq!(contain(async { Ok::<_, anyhow::Error>(3) }).await.unwrap(), 3);
        let err = contain(async { Err::<(), _>(anyhow!("boom")) }).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn panic_becomes_error() {
        let err = contain(async {
            if true {
                panic!("selector exploded");
            }
            Ok::<(), anyhow::Error>(())
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("selector exploded"));
    }
}
