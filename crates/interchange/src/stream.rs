//! Streaming adapter.
//!
//! Incremental encoders and decoders implement [`Transform`]: a push-driven
//! state machine fed one input at a time that appends zero or more outputs
//! to a queue. Two drivers sit on top:
//!
//! - [`Pipeline`]: a synchronous iterator that pulls input lazily, only when
//!   its output queue is empty.
//! - [`duplex`]: an async writer/reader pair over a bounded channel. The
//!   reader implements [`futures::Stream`] and drives the transform, so a
//!   slow reader back-pressures the writer.
//!
//! Both optionally wrap each item as a single-field `{"value": v}` object so
//! that a literal `null` can travel through APIs where it would otherwise
//! mean end of stream.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{CodecError, EnvelopeError};
use crate::value::Value;

/// Incremental transformation from inputs to outputs.
pub trait Transform {
    type Input;
    type Output;

    /// Consumes one input, appending any outputs it completes.
    fn push(&mut self, input: Self::Input, out: &mut VecDeque<Self::Output>)
        -> Result<(), CodecError>;

    /// Signals end of input, appending any trailing outputs.
    fn finish(&mut self, out: &mut VecDeque<Self::Output>) -> Result<(), CodecError>;
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    type Input = T::Input;
    type Output = T::Output;

    fn push(
        &mut self,
        input: Self::Input,
        out: &mut VecDeque<Self::Output>,
    ) -> Result<(), CodecError> {
        (**self).push(input, out)
    }

    fn finish(&mut self, out: &mut VecDeque<Self::Output>) -> Result<(), CodecError> {
        (**self).finish(out)
    }
}

/// Items that can travel wrapped in a stream frame.
///
/// Only [`Value`] needs real wrapping; byte chunks and other item types use
/// the identity defaults.
pub trait Frame: Sized {
    fn wrap_frame(self) -> Self {
        self
    }

    fn unwrap_frame(self) -> Result<Self, CodecError> {
        Ok(self)
    }
}

impl Frame for Vec<u8> {}

impl Frame for Value {
    fn wrap_frame(self) -> Self {
        let mut obj = IndexMap::with_capacity(1);
        obj.insert("value".to_owned(), self);
        Value::Object(obj)
    }

    fn unwrap_frame(self) -> Result<Self, CodecError> {
        match self {
            Value::Object(mut obj) if obj.len() == 1 => match obj.swap_remove("value") {
                Some(value) => Ok(value),
                None => Err(EnvelopeError::NotWrapped.into()),
            },
            _ => Err(EnvelopeError::NotWrapped.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Finished,
    Failed,
}

/// Transform plus output queue, shared by both drivers.
struct Core<T: Transform> {
    /// Dropped on failure so buffered partial input is released.
    transform: Option<T>,
    pending: VecDeque<T::Output>,
    state: State,
    wrap: bool,
}

impl<T> Core<T>
where
    T: Transform,
    T::Input: Frame,
    T::Output: Frame,
{
    fn new(transform: T, wrap: bool) -> Self {
        Self {
            transform: Some(transform),
            pending: VecDeque::new(),
            state: State::Open,
            wrap,
        }
    }

    fn pop(&mut self) -> Option<T::Output> {
        let out = self.pending.pop_front()?;
        Some(if self.wrap { out.wrap_frame() } else { out })
    }

    fn accept(&mut self, input: T::Input) -> Result<(), CodecError> {
        let input = if self.wrap { input.unwrap_frame()? } else { input };
        match self.transform.as_mut() {
            Some(transform) => transform.push(input, &mut self.pending),
            None => Err(CodecError::StreamClosed),
        }
    }

    fn finish(&mut self) -> Result<(), CodecError> {
        self.state = State::Finished;
        let result = match self.transform.as_mut() {
            Some(transform) => transform.finish(&mut self.pending),
            None => Err(CodecError::StreamClosed),
        };
        debug!(pending = self.pending.len(), "stream input finished");
        result
    }

    fn fail(&mut self, err: &CodecError) {
        debug!(error = %err, "stream failed");
        self.abort();
    }

    fn abort(&mut self) {
        self.state = State::Failed;
        self.pending.clear();
        self.transform = None;
    }
}

/// Synchronous pull-based driver over an input iterator.
///
/// Errors are terminal: after yielding an `Err` the pipeline yields `None`.
pub struct Pipeline<T: Transform, I> {
    core: Core<T>,
    input: I,
}

impl<T, I> Pipeline<T, I>
where
    T: Transform,
    T::Input: Frame,
    T::Output: Frame,
    I: Iterator<Item = T::Input>,
{
    pub fn new(transform: T, input: I) -> Self {
        Self {
            core: Core::new(transform, false),
            input,
        }
    }

    /// Unwraps `{"value": v}` frames on input and wraps outputs the same way.
    pub fn wrapped(transform: T, input: I) -> Self {
        Self {
            core: Core::new(transform, true),
            input,
        }
    }
}

impl<T, I> Iterator for Pipeline<T, I>
where
    T: Transform,
    T::Input: Frame,
    T::Output: Frame,
    I: Iterator<Item = T::Input>,
{
    type Item = Result<T::Output, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(out) = self.core.pop() {
                return Some(Ok(out));
            }
            if self.core.state != State::Open {
                return None;
            }
            let step = match self.input.next() {
                Some(item) => self.core.accept(item),
                None => self.core.finish(),
            };
            if let Err(err) = step {
                self.core.fail(&err);
                return Some(Err(err));
            }
        }
    }
}

/// Options for [`duplex`].
#[derive(Debug, Clone, Copy)]
pub struct DuplexOptions {
    /// Wrap items as `{"value": v}` frames on both sides.
    pub wrap: bool,
    /// Number of inputs the writer may queue ahead of the reader.
    pub capacity: usize,
}

impl Default for DuplexOptions {
    fn default() -> Self {
        Self {
            wrap: false,
            capacity: 16,
        }
    }
}

/// Splits a transform into an async writable side and a readable side.
pub fn duplex<T>(transform: T, options: DuplexOptions) -> (DuplexWriter<T::Input>, DuplexReader<T>)
where
    T: Transform,
    T::Input: Frame,
    T::Output: Frame,
{
    let (tx, rx) = mpsc::channel(options.capacity.max(1));
    (
        DuplexWriter { tx },
        DuplexReader {
            rx,
            core: Core::new(transform, options.wrap),
        },
    )
}

/// Writable half of a [`duplex`]. Dropping it, or calling [`end`](Self::end),
/// signals end of input.
pub struct DuplexWriter<I> {
    tx: mpsc::Sender<I>,
}

impl<I> DuplexWriter<I> {
    /// Queues one input, waiting while the channel is full.
    ///
    /// Fails with [`CodecError::StreamClosed`] once the reader has failed,
    /// been aborted or dropped.
    pub async fn write(&self, item: I) -> Result<(), CodecError> {
        self.tx.send(item).await.map_err(|_| CodecError::StreamClosed)
    }

    pub fn end(self) {}
}

/// Readable half of a [`duplex`].
pub struct DuplexReader<T: Transform> {
    rx: mpsc::Receiver<T::Input>,
    core: Core<T>,
}

impl<T> DuplexReader<T>
where
    T: Transform,
    T::Input: Frame,
    T::Output: Frame,
{
    /// Reads the next output, `None` at end of stream.
    pub async fn read(&mut self) -> Option<Result<T::Output, CodecError>> {
        std::future::poll_fn(|cx| self.poll_read(cx)).await
    }

    /// Cancels the stream: buffered state is dropped and pending writes fail.
    pub fn abort(&mut self) {
        debug!("stream aborted");
        self.core.abort();
        self.rx.close();
    }

    fn poll_read(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<T::Output, CodecError>>> {
        loop {
            if let Some(out) = self.core.pop() {
                return Poll::Ready(Some(Ok(out)));
            }
            if self.core.state != State::Open {
                return Poll::Ready(None);
            }
            let step = match self.rx.poll_recv(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(item)) => self.core.accept(item),
                Poll::Ready(None) => self.core.finish(),
            };
            if let Err(err) = step {
                self.core.fail(&err);
                self.rx.close();
                return Poll::Ready(Some(Err(err)));
            }
        }
    }
}

impl<T> Stream for DuplexReader<T>
where
    T: Transform + Unpin,
    T::Input: Frame,
    T::Output: Frame + Unpin,
{
    type Item = Result<T::Output, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_read(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Splits byte chunks into lines; emits each complete line.
    #[derive(Default)]
    struct Lines {
        buf: Vec<u8>,
    }

    impl Transform for Lines {
        type Input = Vec<u8>;
        type Output = Vec<u8>;

        fn push(&mut self, input: Vec<u8>, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
            for b in input {
                if b == b'\n' {
                    out.push_back(std::mem::take(&mut self.buf));
                } else if b == b'!' {
                    return Err(CodecError::StreamClosed);
                } else {
                    self.buf.push(b);
                }
            }
            Ok(())
        }

        fn finish(&mut self, out: &mut VecDeque<Vec<u8>>) -> Result<(), CodecError> {
            if !self.buf.is_empty() {
                out.push_back(std::mem::take(&mut self.buf));
            }
            Ok(())
        }
    }

    #[test]
    fn pipeline_emits_across_chunk_boundaries() {
        let chunks = vec![b"ab\nc".to_vec(), b"d\ne".to_vec()];
        let out: Vec<Vec<u8>> = Pipeline::new(Lines::default(), chunks.into_iter())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(out, vec![b"ab".to_vec(), b"cd".to_vec(), b"e".to_vec()]);
    }

    #[test]
    fn pipeline_error_is_terminal() {
        let chunks = vec![b"a\n".to_vec(), b"!".to_vec(), b"b\n".to_vec()];
        let mut p = Pipeline::new(Lines::default(), chunks.into_iter());
        assert_eq!(p.next().unwrap().unwrap(), b"a".to_vec());
        assert!(p.next().unwrap().is_err());
        assert!(p.next().is_none());
    }

    #[test]
    fn pipeline_pulls_lazily() {
        let mut pulled = 0;
        let input = std::iter::from_fn(|| {
            pulled += 1;
            Some(b"x\n".to_vec())
        });
        let mut p = Pipeline::new(Lines::default(), input);
        p.next();
        p.next();
        drop(p);
        assert_eq!(pulled, 2);
    }

    #[test]
    fn value_frame_wraps_null() {
        let framed = Value::Null.wrap_frame();
        assert_eq!(framed, Value::object([("value", Value::Null)]));
        assert_eq!(framed.unwrap_frame().unwrap(), Value::Null);
    }

    #[test]
    fn unwrapping_bare_value_fails() {
        assert!(Value::from(1).unwrap_frame().is_err());
        assert!(Value::object([("value", 1), ("other", 2)]).unwrap_frame().is_err());
    }

    #[tokio::test]
    async fn duplex_reads_what_was_written() {
        let (writer, mut reader) = duplex(Lines::default(), DuplexOptions::default());
        let producer = async move {
            writer.write(b"one\ntw".to_vec()).await.unwrap();
            writer.write(b"o\n".to_vec()).await.unwrap();
        };
        let consumer = async {
            let mut out = Vec::new();
            while let Some(item) = reader.read().await {
                out.push(item.unwrap());
            }
            out
        };
        let ((), out) = tokio::join!(producer, consumer);
        assert_eq!(out, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[tokio::test]
    async fn duplex_failure_closes_writer() {
        let (writer, mut reader) = duplex(
            Lines::default(),
            DuplexOptions {
                wrap: false,
                capacity: 1,
            },
        );
        writer.write(b"!".to_vec()).await.unwrap();
        assert!(reader.read().await.unwrap().is_err());
        assert!(reader.read().await.is_none());
        assert!(matches!(
            writer.write(b"x".to_vec()).await,
            Err(CodecError::StreamClosed)
        ));
    }
}
