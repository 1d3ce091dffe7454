use crate::error::{Error, Result};

/// Size of a data page in byte.
pub const PAGE_SIZE: usize = 4096;

const INT_SIZE: usize = std::mem::size_of::<i32>();

/// The in-memory image of one disk block.
///
/// Values are stored big-endian at caller chosen offsets. Byte arrays and
/// strings are prefixed with their length as an i32.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    data: Vec<u8>,
}

impl Page {
    pub fn new() -> Self {
        Page { data: vec![0; PAGE_SIZE] }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > PAGE_SIZE {
            return Err(Error::Internal(format!(
                "block of {} bytes does not fit a page of {} bytes",
                bytes.len(),
                PAGE_SIZE
            )));
        }
        let mut page = Page::new();
        page.data[..bytes.len()].copy_from_slice(bytes);
        Ok(page)
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn get_i32(&self, offset: usize) -> Result<i32> {
        let raw = self.slice(offset, INT_SIZE)?;
        Ok(i32::from_be_bytes(raw.try_into()?))
    }

    pub fn set_i32(&mut self, offset: usize, value: i32) -> Result<()> {
        self.slice_mut(offset, INT_SIZE)?.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn get_bytes(&self, offset: usize) -> Result<Vec<u8>> {
        let len = usize::try_from(self.get_i32(offset)?)?;
        Ok(self.slice(offset + INT_SIZE, len)?.to_vec())
    }

    pub fn set_bytes(&mut self, offset: usize, value: &[u8]) -> Result<()> {
        // check the whole range first so a failed write leaves the page intact
        self.slice(offset, INT_SIZE + value.len())?;
        self.set_i32(offset, i32::try_from(value.len())?)?;
        self.slice_mut(offset + INT_SIZE, value.len())?.copy_from_slice(value);
        Ok(())
    }

    pub fn get_string(&self, offset: usize) -> Result<String> {
        Ok(String::from_utf8(self.get_bytes(offset)?)?)
    }

    pub fn set_string(&mut self, offset: usize, value: &str) -> Result<()> {
        self.set_bytes(offset, value.as_bytes())
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = Self::end_of(offset, len)?;
        Ok(&self.data[offset..end])
    }

    fn slice_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let end = Self::end_of(offset, len)?;
        Ok(&mut self.data[offset..end])
    }

    fn end_of(offset: usize, len: usize) -> Result<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= PAGE_SIZE => Ok(end),
            _ => Err(Error::Value(format!(
                "range {}+{} is out of page bounds {}",
                offset, len, PAGE_SIZE
            ))),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new()
    }
}

impl AsRef<[u8]> for Page {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Lays out the initial contents of a freshly allocated block.
pub trait PageFormatter {
    fn format(&self, page: &mut Page);
}

impl<F> PageFormatter for F
where
    F: Fn(&mut Page),
{
    fn format(&self, page: &mut Page) {
        self(page)
    }
}

/// Leaves a new block zero filled.
pub struct ZeroFormatter;

impl PageFormatter for ZeroFormatter {
    fn format(&self, page: &mut Page) {
        page.clear();
    }
}
