use super::SlackError;
use std::thread;
use std::time::Duration;

pub const MAX_RATE_LIMIT_RETRIES: usize = 5;

/// Runs `op`, sleeping and retrying on rate-limit signals up to
/// `MAX_RATE_LIMIT_RETRIES`. Every other failure is returned to the caller
/// unmodified on the attempt it occurred.
pub fn with_rate_limit_retry<T, F>(mut op: F) -> Result<T, SlackError>
where
    F: FnMut() -> Result<T, SlackError>,
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match op() {
            Err(SlackError::RateLimited { retry_after_secs })
                if attempt <= MAX_RATE_LIMIT_RETRIES =>
            {
                thread::sleep(rate_limit_sleep_duration(retry_after_secs));
            }
            outcome => return outcome,
        }
    }
}

pub(crate) fn rate_limit_sleep_duration(retry_after_secs: u64) -> Duration {
    let requested = Duration::from_secs(retry_after_secs.max(1));
    let Some(cap_ms) = std::env::var("INVITECLAW_RATE_LIMIT_SLEEP_MAX_MILLISECONDS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
    else {
        return requested;
    };
    requested.min(Duration::from_millis(cap_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_cap_env_var_bounds_the_requested_delay() {
        std::env::set_var("INVITECLAW_RATE_LIMIT_SLEEP_MAX_MILLISECONDS", "0");
        assert_eq!(rate_limit_sleep_duration(0), Duration::ZERO);
        assert_eq!(rate_limit_sleep_duration(30), Duration::ZERO);
    }

    #[test]
    fn non_rate_limit_errors_return_on_first_attempt() {
        let mut calls = 0usize;
        let outcome: Result<(), SlackError> = with_rate_limit_retry(|| {
            calls += 1;
            Err(SlackError::ApiResponse("cant_invite".to_string()))
        });
        assert!(matches!(outcome, Err(SlackError::ApiResponse(code)) if code == "cant_invite"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn rate_limits_retry_until_the_bound_then_surface() {
        std::env::set_var("INVITECLAW_RATE_LIMIT_SLEEP_MAX_MILLISECONDS", "0");
        let mut calls = 0usize;
        let outcome: Result<(), SlackError> = with_rate_limit_retry(|| {
            calls += 1;
            Err(SlackError::RateLimited {
                retry_after_secs: 1,
            })
        });
        assert!(matches!(outcome, Err(SlackError::RateLimited { .. })));
        assert_eq!(calls, MAX_RATE_LIMIT_RETRIES + 1);
    }

    #[test]
    fn rate_limited_attempts_recover_once_the_signal_clears() {
        std::env::set_var("INVITECLAW_RATE_LIMIT_SLEEP_MAX_MILLISECONDS", "0");
        let mut calls = 0usize;
        let outcome = with_rate_limit_retry(|| {
            calls += 1;
            if calls < 3 {
                Err(SlackError::RateLimited {
                    retry_after_secs: 1,
                })
            } else {
                Ok(calls)
            }
        });
        assert_eq!(outcome.expect("recovered"), 3);
    }
}
