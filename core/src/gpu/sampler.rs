// core/src/gpu/sampler.rs
use super::Sampler;
use crate::error::SamplerError;
use std::io::{self, ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Arguments asking nvidia-smi for `index, util, used, total` rows without header or units.
pub const SMI_QUERY_ARGS: [&str; 2] = [
    "--query-gpu=index,utilization.gpu,memory.used,memory.total",
    "--format=csv,noheader,nounits",
];

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the diagnostic command and returns its stdout.
#[derive(Debug, Clone)]
pub struct SmiSampler {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SmiSampler {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self::with_args(program, SMI_QUERY_ARGS, timeout)
    }

    pub fn with_args<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SmiSampler {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    fn spawn(&self) -> Result<Child, SamplerError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                if source.kind() == ErrorKind::NotFound {
                    SamplerError::NotFound { program: self.program.clone() }
                } else {
                    SamplerError::Spawn { program: self.program.clone(), source }
                }
            })
    }
}

// Pipes are drained off-thread so a chatty child can't block on a full pipe
// while we poll for the deadline.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = match pipe {
            Some(mut pipe) => pipe.read_to_end(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        let _ = tx.send(result);
    });
    rx
}

/// Waits for a drained pipe against the same deadline as the child itself.
/// A background process that inherited the pipe keeps it open past the
/// child's exit, so this can time out even after a clean exit.
fn collect(
    rx: &Receiver<io::Result<Vec<u8>>>,
    deadline: Instant,
    program: &str,
    timeout: Duration,
) -> Result<Vec<u8>, SamplerError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(source)) => Err(SamplerError::Read { program: program.to_string(), source }),
        Err(RecvTimeoutError::Timeout) => Err(SamplerError::Timeout {
            program: program.to_string(),
            timeout,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(SamplerError::Read {
            program: program.to_string(),
            source: io::Error::new(ErrorKind::Other, "pipe reader exited without a result"),
        }),
    }
}

impl Sampler for SmiSampler {
    fn name(&self) -> &str {
        &self.program
    }

    fn sample(&mut self) -> Result<String, SamplerError> {
        let mut child = self.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SamplerError::Timeout {
                        program: self.program.clone(),
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SamplerError::Wait { program: self.program.clone(), source });
                }
            }
        };

        let stdout = collect(&stdout, deadline, &self.program, self.timeout)?;
        let stderr = collect(&stderr, deadline, &self.program, self.timeout)?;

        if !status.success() {
            return Err(SamplerError::Exit {
                program: self.program.clone(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        String::from_utf8(stdout).map_err(|source| SamplerError::Decode {
            program: self.program.clone(),
            source,
        })
    }
}
