//! Shared outbound HTTP helpers.
//!
//! Every client in the crate retries transport failures with the same policy:
//! doubling backoff starting at 150 ms, capped at 1200 ms, with up to 50 ms of
//! jitter per attempt. Non-2xx responses are returned to the caller untouched.

use anyhow::Result;

pub async fn post_with_retry<T: serde::Serialize>(
    client: &reqwest::Client,
    url: String,
    payload: &T,
    timeout: std::time::Duration,
    attempts: usize,
) -> Result<reqwest::Response> {
    let mut delay_ms = 150u64;

    for attempt in 0..attempts {
        let response = client
            .post(url.clone())
            .json(payload)
            .timeout(timeout)
            .send()
            .await;

        match response {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                if attempt + 1 == attempts {
                    return Err(anyhow::anyhow!(e));
                }
                let jitter = rand::random::<u64>() % 50;
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms + jitter)).await;
                delay_ms = (delay_ms * 2).min(1200);
            }
        }
    }

    Err(anyhow::anyhow!("Retry attempts exhausted"))
}

pub async fn get_with_retry(
    client: &reqwest::Client,
    url: String,
    timeout: std::time::Duration,
    attempts: usize,
) -> Result<reqwest::Response> {
    let mut delay_ms = 150u64;

    for attempt in 0..attempts {
        let response = client.get(url.clone()).timeout(timeout).send().await;

        match response {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                if attempt + 1 == attempts {
                    return Err(anyhow::anyhow!(e));
                }
                let jitter = rand::random::<u64>() % 50;
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms + jitter)).await;
                delay_ms = (delay_ms * 2).min(1200);
            }
        }
    }

    Err(anyhow::anyhow!("Retry attempts exhausted"))
}
