use crate::error::Error;
use crate::error::Result;
use crate::tag::Tag;

/// A zero-copy, bounds-checked view over encoded bytes.
///
/// Reads advance the view. Container reads return a new `Decoder` restricted
/// to the container body, so a malformed length can never read past its parent.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes left in this view.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Fails if any bytes remain.
    pub fn finish(&self) -> Result<()> {
        match self.buf.len() {
            0 => Ok(()),
            n => Err(Error::TrailingBytes(n)),
        }
    }

    /// The next tag, without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        let b = *self.buf.first().ok_or(Error::UnexpectedEnd)?;
        Tag::try_from(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn take_len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.take_array()?) as usize)
    }

    fn expect(&mut self, tag: Tag, expected: &'static str) -> Result<()> {
        let found = self.peek_tag()?;
        if found != tag {
            return Err(Error::UnexpectedTag { expected, found: found as u8 });
        }
        self.take(1)?;
        Ok(())
    }

    /// Skips the next item, including anything nested inside it.
    pub fn skip(&mut self) -> Result<()> {
        let tag = self.peek_tag()?;
        self.take(1)?;
        let len = match tag.fixed_width() {
            Some(width) => width,
            None => self.take_len()?,
        };
        self.take(len)?;
        Ok(())
    }

    pub fn unit(&mut self) -> Result<()> { self.expect(Tag::Unit, "unit") }
    pub fn option_none(&mut self) -> Result<()> { self.expect(Tag::OptionNone, "none") }

    pub fn bool(&mut self) -> Result<bool> {
        match self.peek_tag()? {
            Tag::BoolTrue => { self.take(1)?; Ok(true) }
            Tag::BoolFalse => { self.take(1)?; Ok(false) }
            other => Err(Error::UnexpectedTag { expected: "bool", found: other as u8 }),
        }
    }

    pub fn s32(&mut self) -> Result<i32> { self.expect(Tag::S32, "s32")?; Ok(i32::from_le_bytes(self.take_array()?)) }
    pub fn s64(&mut self) -> Result<i64> { self.expect(Tag::S64, "s64")?; Ok(i64::from_le_bytes(self.take_array()?)) }
    pub fn u32(&mut self) -> Result<u32> { self.expect(Tag::U32, "u32")?; Ok(u32::from_le_bytes(self.take_array()?)) }
    pub fn u64(&mut self) -> Result<u64> { self.expect(Tag::U64, "u64")?; Ok(u64::from_le_bytes(self.take_array()?)) }
    pub fn f64(&mut self) -> Result<f64> { self.expect(Tag::F64, "f64")?; Ok(f64::from_le_bytes(self.take_array()?)) }

    pub fn str(&mut self) -> Result<&'a str> {
        self.expect(Tag::String, "string")?;
        let len = self.take_len()?;
        std::str::from_utf8(self.take(len)?).map_err(|_| Error::InvalidUtf8)
    }

    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        self.expect(Tag::Bytes, "bytes")?;
        let len = self.take_len()?;
        self.take(len)
    }

    fn enter(&mut self, tag: Tag, expected: &'static str) -> Result<Decoder<'a>> {
        self.expect(tag, expected)?;
        let len = self.take_len()?;
        Ok(Decoder::new(self.take(len)?))
    }

    pub fn list(&mut self) -> Result<ListIter<'a>> {
        Ok(ListIter { dec: self.enter(Tag::List, "list")? })
    }

    pub fn map(&mut self) -> Result<MapIter<'a>> {
        Ok(MapIter { dec: self.enter(Tag::Map, "map")? })
    }

    /// `Some(payload)` or `None`.
    pub fn option(&mut self) -> Result<Option<Decoder<'a>>> {
        match self.peek_tag()? {
            Tag::OptionNone => { self.take(1)?; Ok(None) }
            Tag::OptionSome => Ok(Some(self.enter(Tag::OptionSome, "some")?)),
            other => Err(Error::UnexpectedTag { expected: "option", found: other as u8 }),
        }
    }

    /// `Ok(payload)` or `Err(payload)`.
    pub fn result(&mut self) -> Result<std::result::Result<Decoder<'a>, Decoder<'a>>> {
        match self.peek_tag()? {
            Tag::ResultOk => Ok(Ok(self.enter(Tag::ResultOk, "ok")?)),
            Tag::ResultErr => Ok(Err(self.enter(Tag::ResultErr, "err")?)),
            other => Err(Error::UnexpectedTag { expected: "result", found: other as u8 }),
        }
    }

    /// Returns `(name, payload)`.
    pub fn variant(&mut self) -> Result<(&'a str, Decoder<'a>)> {
        let mut body = self.enter(Tag::Variant, "variant")?;
        let name = body.str()?;
        Ok((name, body))
    }
}

/// Walks the items of a list, one sub-decoder per item.
#[derive(Debug)]
pub struct ListIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = Result<Decoder<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.dec.remaining() == 0 {
            return None;
        }
        let mut probe = self.dec.clone();
        if let Err(e) = probe.skip() {
            // poison the iterator so a corrupt item is reported once
            self.dec = Decoder::new(&[]);
            return Some(Err(e));
        }
        let len = self.dec.remaining() - probe.remaining();
        Some(self.dec.take(len).map(Decoder::new))
    }
}

/// Walks the `(key, value)` entries of a map.
#[derive(Debug)]
pub struct MapIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> Iterator for MapIter<'a> {
    type Item = Result<(&'a str, Decoder<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.dec.remaining() == 0 {
            return None;
        }
        let entry = self.dec.variant();
        if entry.is_err() {
            self.dec = Decoder::new(&[]);
        }
        Some(entry)
    }
}
