use crate::Blob;
use std::slice;

/// An iterator over the body bytes of a message
pub struct MessageBytes<'a> {
    buffers: slice::Iter<'a, Blob>,
    current: slice::Iter<'a, u8>,
}

impl<'a> MessageBytes<'a> {
    pub(super) fn new(buffers: &'a [Blob]) -> Self {
        let mut buffers = buffers.iter();
        Self {
            current: buffers
                .next()
                .map(|blob| blob.data().iter())
                .unwrap_or([].iter()),
            buffers,
        }
    }
}

impl<'a> Iterator for MessageBytes<'a> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(byte) = self.current.next() {
                return Some(*byte);
            }
            self.current = self.buffers.next()?.data().iter();
        }
    }
}
