use serde::Serialize;

/// KB as reported by ps; a fixed divisor converts to MB.
const KB_PER_MB: f64 = 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

/// One-shot CPU/RSS snapshot for a live PID.
///
/// `None` covers every failure: the process exited between the liveness
/// check and the sample, ps is unavailable, or the output is malformed.
pub async fn sample(pid: u32) -> Option<ResourceSample> {
    let output = tokio::process::Command::new("ps")
        .args(["-o", "%cpu=,rss=", "-p", &pid.to_string()])
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_ps_line(&String::from_utf8_lossy(&output.stdout))
}

fn parse_ps_line(line: &str) -> Option<ResourceSample> {
    let mut fields = line.split_whitespace();
    let cpu_percent: f64 = fields.next()?.parse().ok()?;
    let rss_kb: f64 = fields.next()?.parse().ok()?;
    Some(ResourceSample {
        cpu_percent,
        memory_mb: rss_kb / KB_PER_MB,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ps_line() {
        let sample = parse_ps_line("  2.5 204800\n").unwrap();
        assert_eq!(sample.cpu_percent, 2.5);
        assert_eq!(sample.memory_mb, 200.0);
    }

    #[test]
    fn test_parse_ps_line_garbage() {
        assert!(parse_ps_line("").is_none());
        assert!(parse_ps_line("nope\n").is_none());
        assert!(parse_ps_line("1.0\n").is_none());
    }

    #[tokio::test]
    async fn test_sample_current_process() {
        let sample = sample(std::process::id()).await;
        let sample = sample.expect("should sample own process");
        assert!(sample.memory_mb > 0.0);
        assert!(sample.cpu_percent >= 0.0);
    }

    #[tokio::test]
    async fn test_sample_nonexistent_pid() {
        assert!(sample(999_999_999).await.is_none());
    }
}
