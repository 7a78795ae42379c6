//! Response bodies as byte-chunk streams, with duplication for observation.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BodyError {
    #[error("{0}")]
    Read(String),
    #[error("body aborted")]
    Aborted,
}

type Chunk = Result<Bytes, BodyError>;

/// A readable response body.
pub struct Body {
    inner: BoxStream<'static, Chunk>,
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Body")
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

/// Producer side of [`Body::channel`].
#[derive(Clone)]
pub struct BodyFeed {
    sender: mpsc::UnboundedSender<Chunk>,
}

impl BodyFeed {
    /// Push a chunk. Returns false once the body has been dropped.
    pub fn push(&self, chunk: impl Into<Bytes>) -> bool {
        self.sender.send(Ok(chunk.into())).is_ok()
    }

    pub fn fail(&self, error: BodyError) -> bool {
        self.sender.send(Err(error)).is_ok()
    }
}

impl Body {
    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes>,
    {
        Self::from_stream(stream::iter(chunks.into_iter().map(|chunk| Ok(chunk.into()))))
    }

    pub fn from_stream<S>(inner: S) -> Self
    where
        S: futures::Stream<Item = Chunk> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
        }
    }

    /// A body fed by hand. It ends when every feed handle is dropped.
    pub fn channel() -> (BodyFeed, Body) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (BodyFeed { sender }, Self::from_receiver(receiver))
    }

    fn from_receiver(receiver: mpsc::UnboundedReceiver<Chunk>) -> Self {
        Self::from_stream(stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|chunk| (chunk, receiver))
        }))
    }

    pub async fn next_chunk(&mut self) -> Option<Chunk> {
        self.inner.next().await
    }

    /// Read to the end.
    pub async fn bytes(mut self) -> Result<Bytes, BodyError> {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out.freeze())
    }

    pub async fn text(self) -> Result<String, BodyError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Split into two independent bodies carrying the same chunks in the same order.
    ///
    /// A pump task reads the source and feeds both branches. Dropping one branch never stalls
    /// or cancels the other. Must be called inside a tokio runtime.
    pub fn tee(self) -> (Body, Body) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        let mut source = self.inner;
        tokio::spawn(async move {
            while let Some(chunk) = source.next().await {
                let failed = chunk.is_err();
                let left = left_tx.send(chunk.clone()).is_ok();
                let right = right_tx.send(chunk).is_ok();
                if failed || (!left && !right) {
                    break;
                }
            }
        });
        (Self::from_receiver(left_rx), Self::from_receiver(right_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tee_delivers_identical_chunks_to_both_branches() {
        let body = Body::from_chunks(vec!["ab", "cd", "ef"]);
        let (left, right) = body.tee();
        assert_eq!(left.text().await.unwrap(), "abcdef");
        assert_eq!(right.text().await.unwrap(), "abcdef");
    }

    #[tokio::test]
    async fn dropping_one_branch_leaves_the_other_intact() {
        let (feed, body) = Body::channel();
        let (left, right) = body.tee();
        drop(right);
        feed.push("one");
        feed.push("two");
        drop(feed);
        assert_eq!(left.text().await.unwrap(), "onetwo");
    }

    #[tokio::test]
    async fn read_errors_reach_both_branches() {
        let (feed, body) = Body::channel();
        let (mut left, mut right) = body.tee();
        feed.push("x");
        feed.fail(BodyError::Read("reset".into()));

        assert_eq!(left.next_chunk().await, Some(Ok(Bytes::from("x"))));
        assert_eq!(
            left.next_chunk().await,
            Some(Err(BodyError::Read("reset".into())))
        );
        assert_eq!(right.next_chunk().await, Some(Ok(Bytes::from("x"))));
        assert!(right.next_chunk().await.unwrap().is_err());
    }
}
