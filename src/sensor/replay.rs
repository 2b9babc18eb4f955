use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::{AccelerationSample, SampleSender, SensorSource};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Replays readings from a text stream, one per line.
///
/// Accepted forms are `x y z` (stamped on arrival) and `t_ms x y z` (stamped
/// relative to when replay started). Fields may be separated by whitespace or
/// commas. Blank lines and `#` comments are skipped.
pub struct ReplaySensor<R> {
    reader: Option<R>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl<R> ReplaySensor<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            handle: None,
            cancel_token: None,
        }
    }
}

/// Parse one line. `Ok(None)` for lines that carry no reading.
pub fn parse_line(line: &str, origin: Instant) -> Result<Option<AccelerationSample>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let fields = trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty())
        .map(|field| {
            field
                .parse::<f64>()
                .with_context(|| format!("invalid number '{field}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    match fields.as_slice() {
        [x, y, z] => Ok(Some(AccelerationSample::new(*x, *y, *z))),
        [t_ms, x, y, z] => {
            if !t_ms.is_finite() || *t_ms < 0.0 {
                bail!("timestamp {t_ms} must be a non-negative number of milliseconds");
            }
            let timestamp = Duration::try_from_secs_f64(t_ms / 1000.0)
                .ok()
                .and_then(|offset| origin.checked_add(offset))
                .ok_or_else(|| anyhow!("timestamp {t_ms}ms is out of range"))?;
            Ok(Some(AccelerationSample::at(*x, *y, *z, timestamp)))
        }
        other => Err(anyhow!("expected 3 or 4 fields, found {}", other.len())),
    }
}

#[async_trait]
impl<R> SensorSource for ReplaySensor<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn is_supported(&self) -> bool {
        true
    }

    fn start(&mut self, tx: SampleSender) -> Result<()> {
        if self.handle.is_some() {
            bail!("replay sensor already running");
        }
        let reader = self
            .reader
            .take()
            .ok_or_else(|| anyhow!("replay input has already been consumed"))?;

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let origin = Instant::now();
            let mut lines = reader.lines();
            let mut line_no: u64 = 0;
            let mut emitted: u64 = 0;

            loop {
                let next = tokio::select! {
                    next = lines.next_line() => next,
                    _ = token.cancelled() => break,
                };

                let line = match next {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        log_warn!("replay input read failed: {err}");
                        break;
                    }
                };
                line_no += 1;

                match parse_line(&line, origin) {
                    Ok(Some(sample)) => {
                        if tx.send(sample).is_err() {
                            break;
                        }
                        emitted += 1;
                    }
                    Ok(None) => {}
                    Err(err) => log_warn!("skipping replay line {line_no}: {err:#}"),
                }
            }

            log_info!("replay finished: {} samples from {} lines", emitted, line_no);
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle.await.context("replay task failed to join")
        } else {
            Ok(())
        }
    }
}
