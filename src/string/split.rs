//! Splitting iterators over arena strings
//!
//! Both yield views into the source bytes; nothing is allocated.

use core::iter::FusedIterator;

use memchr::memmem;

use super::Str;

/// Fields separated by a byte sequence, see [`Str::split`]
///
/// Empty fields between adjacent separators are yielded. A separator at the
/// very end does not produce a trailing empty field.
#[derive(Debug, Clone)]
pub struct Split<'a, 'p> {
    rest: &'a [u8],
    sep: &'p [u8],
    done: bool,
}

impl<'a, 'p> Split<'a, 'p> {
    pub(super) fn new(haystack: &'a [u8], sep: &'p [u8]) -> Self {
        assert!(!sep.is_empty(), "separator cannot be empty");
        Self {
            rest: haystack,
            sep,
            done: haystack.is_empty(),
        }
    }
}

impl<'a> Iterator for Split<'a, '_> {
    type Item = Str<'a>;

    fn next(&mut self) -> Option<Str<'a>> {
        if self.done {
            return None;
        }

        match memmem::find(self.rest, self.sep) {
            Some(at) => {
                let field = &self.rest[..at];
                self.rest = &self.rest[at + self.sep.len()..];
                if self.rest.is_empty() {
                    self.done = true;
                }
                Some(Str::new(field))
            }
            None => {
                self.done = true;
                Some(Str::new(self.rest))
            }
        }
    }
}

impl FusedIterator for Split<'_, '_> {}

/// Tokens separated by runs of bytes from a set, see [`Str::split_any`]
///
/// A leading separator yields one empty token; runs of separators elsewhere
/// are collapsed.
#[derive(Clone)]
pub struct SplitAny<'a> {
    rest: &'a [u8],
    table: [bool; 256],
    done: bool,
}

impl<'a> SplitAny<'a> {
    pub(super) fn new(haystack: &'a [u8], charset: &[u8]) -> Self {
        assert!(!charset.is_empty(), "charset cannot be empty");
        let mut table = [false; 256];
        for &b in charset {
            table[b as usize] = true;
        }
        Self {
            rest: haystack,
            table,
            done: haystack.is_empty(),
        }
    }

    #[inline]
    fn is_sep(&self, b: u8) -> bool {
        self.table[b as usize]
    }
}

impl<'a> Iterator for SplitAny<'a> {
    type Item = Str<'a>;

    fn next(&mut self) -> Option<Str<'a>> {
        if self.done {
            return None;
        }

        let rest = self.rest;
        let end = rest.iter().position(|&b| self.is_sep(b)).unwrap_or(rest.len());
        let token = &rest[..end];

        let skip = rest[end..].iter().position(|&b| !self.is_sep(b)).unwrap_or(rest.len() - end);
        self.rest = &rest[end + skip..];
        if self.rest.is_empty() {
            self.done = true;
        }

        Some(Str::new(token))
    }
}

impl FusedIterator for SplitAny<'_> {}

impl core::fmt::Debug for SplitAny<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SplitAny")
            .field("rest", &Str::new(self.rest))
            .field("done", &self.done)
            .finish()
    }
}
