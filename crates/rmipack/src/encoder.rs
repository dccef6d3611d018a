use crate::error::Error;
use crate::error::Result;
use crate::tag::Scope;
use crate::tag::Tag;

/// A container that has been opened but not yet closed.
struct Open {
    /// Offset of the first body byte; the u32 length sits just before it.
    body_start: usize,
    scope: Scope,
    items: usize,
}

/// A scope-checked encoder.
///
/// Containers are opened with `*_begin` and closed with the matching `*_end`.
/// Lengths are back-patched on close. Every write is checked against the
/// innermost open scope:
///
/// 1. Maps only accept variants (the key/value pair).
/// 2. Option, Result and Variant scopes hold exactly one item.
/// 3. `into_bytes` fails while any scope is open.
pub struct Encoder {
    buf: Vec<u8>,
    open: Vec<Open>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
            open: Vec::with_capacity(8),
        }
    }

    /// Finishes encoding and returns the bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if !self.open.is_empty() {
            return Err(Error::ScopeStillOpen);
        }
        Ok(self.buf)
    }

    fn scope(&self) -> Scope {
        self.open.last().map(|o| o.scope).unwrap_or(Scope::Root)
    }

    fn admit(&self, tag: Tag) -> Result<()> {
        let Some(open) = self.open.last() else { return Ok(()) };
        if open.scope == Scope::Map && tag != Tag::Variant {
            return Err(Error::InvalidMapEntry);
        }
        if open.scope.holds_one() && open.items >= 1 {
            return Err(Error::TooManyItems(open.scope));
        }
        Ok(())
    }

    fn written(&mut self) {
        if let Some(open) = self.open.last_mut() {
            open.items += 1;
        }
    }

    fn scalar(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        self.admit(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(data);
        self.written();
        Ok(())
    }

    fn blob(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| Error::TooLarge(data.len()))?;
        self.admit(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(data);
        self.written();
        Ok(())
    }

    fn begin(&mut self, tag: Tag, scope: Scope) -> Result<()> {
        self.admit(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&[0; 4]);
        self.open.push(Open { body_start: self.buf.len(), scope, items: 0 });
        Ok(())
    }

    fn end(&mut self, expected: Scope) -> Result<()> {
        let actual = self.scope();
        let Some(open) = self.open.pop() else { return Err(Error::ScopeUnderflow) };
        if actual != expected {
            self.open.push(open);
            return Err(Error::ScopeMismatch { expected, actual });
        }
        if open.scope.holds_one() && open.items == 0 {
            self.open.push(open);
            return Err(Error::EmptyAdt(expected));
        }

        let body_len = self.buf.len() - open.body_start;
        let len = u32::try_from(body_len).map_err(|_| Error::TooLarge(body_len))?;
        self.buf[open.body_start - 4..open.body_start].copy_from_slice(&len.to_le_bytes());
        self.written();
        Ok(())
    }

    pub fn unit(&mut self) -> Result<()> { self.scalar(Tag::Unit, &[]) }
    pub fn option_none(&mut self) -> Result<()> { self.scalar(Tag::OptionNone, &[]) }

    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.scalar(if v { Tag::BoolTrue } else { Tag::BoolFalse }, &[])
    }

    pub fn s32(&mut self, v: i32) -> Result<()> { self.scalar(Tag::S32, &v.to_le_bytes()) }
    pub fn s64(&mut self, v: i64) -> Result<()> { self.scalar(Tag::S64, &v.to_le_bytes()) }
    pub fn u32(&mut self, v: u32) -> Result<()> { self.scalar(Tag::U32, &v.to_le_bytes()) }
    pub fn u64(&mut self, v: u64) -> Result<()> { self.scalar(Tag::U64, &v.to_le_bytes()) }
    pub fn f64(&mut self, v: f64) -> Result<()> { self.scalar(Tag::F64, &v.to_le_bytes()) }

    /// Encodes a UTF-8 string blob.
    pub fn str(&mut self, v: &str) -> Result<()> { self.blob(Tag::String, v.as_bytes()) }
    /// Encodes a raw byte blob.
    pub fn bytes(&mut self, v: &[u8]) -> Result<()> { self.blob(Tag::Bytes, v) }

    pub fn list_begin(&mut self) -> Result<()> { self.begin(Tag::List, Scope::List) }
    pub fn list_end(&mut self) -> Result<()> { self.end(Scope::List) }

    /// Opens a map. Only `variant_begin` may be called directly inside it.
    pub fn map_begin(&mut self) -> Result<()> { self.begin(Tag::Map, Scope::Map) }
    pub fn map_end(&mut self) -> Result<()> { self.end(Scope::Map) }

    pub fn option_some_begin(&mut self) -> Result<()> { self.begin(Tag::OptionSome, Scope::Option) }
    pub fn option_some_end(&mut self) -> Result<()> { self.end(Scope::Option) }

    pub fn result_ok_begin(&mut self) -> Result<()> { self.begin(Tag::ResultOk, Scope::Result) }
    pub fn result_ok_end(&mut self) -> Result<()> { self.end(Scope::Result) }

    pub fn result_err_begin(&mut self) -> Result<()> { self.begin(Tag::ResultErr, Scope::Result) }
    pub fn result_err_end(&mut self) -> Result<()> { self.end(Scope::Result) }

    /// Opens a named variant. Exactly one payload item must follow.
    pub fn variant_begin(&mut self, name: &str) -> Result<()> {
        self.begin(Tag::Variant, Scope::Variant)?;
        self.str(name)?;
        // the name is metadata, not the payload
        if let Some(open) = self.open.last_mut() {
            open.items = 0;
        }
        Ok(())
    }
    pub fn variant_end(&mut self) -> Result<()> { self.end(Scope::Variant) }
}
