use super::error::{ExecError, ExecResult};
use crate::record::{Record, RowSchema};

/// Pull-based iterator over rows.
///
/// An operator starts closed. `open` makes it ready to produce rows from
/// the start; `close` returns it to the closed state, after which it may
/// be opened again. Polling a closed operator fails with `NotOpen`, and
/// `next` past the last row fails with `Exhausted`.
pub trait Operator {
    fn open(&mut self) -> ExecResult<()>;

    fn has_next(&mut self) -> ExecResult<bool>;

    fn next(&mut self) -> ExecResult<Record>;

    /// Restart from the first row
    fn rewind(&mut self) -> ExecResult<()> {
        self.close();
        self.open()
    }

    fn close(&mut self);

    fn schema(&self) -> &RowSchema;

    fn children(&self) -> Vec<&dyn Operator> {
        Vec::new()
    }

    fn set_children(&mut self, children: Vec<Box<dyn Operator>>) -> ExecResult<()> {
        expect_children::<0>(children).map(|_| ())
    }
}

/// The single primitive an operator has to supply: produce the next row
/// or report the end. [`Buffered`] turns it into a full [`Operator`].
pub trait Fetch {
    fn open(&mut self) -> ExecResult<()>;

    /// Next row, or `None` at the end
    fn fetch_next(&mut self) -> ExecResult<Option<Record>>;

    fn close(&mut self);

    fn schema(&self) -> &RowSchema;

    fn children(&self) -> Vec<&dyn Operator> {
        Vec::new()
    }

    fn set_children(&mut self, children: Vec<Box<dyn Operator>>) -> ExecResult<()> {
        expect_children::<0>(children).map(|_| ())
    }

    fn into_operator(self) -> Buffered<Self>
    where
        Self: Sized,
    {
        Buffered::new(self)
    }
}

/// Look-ahead cache over a [`Fetch`] implementation.
///
/// `fetch_next` runs at most once per row handed out, however often
/// `has_next` is polled in between.
pub struct Buffered<F> {
    inner: F,
    open: bool,
    lookahead: Option<Record>,
}

impl<F: Fetch> Buffered<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            open: false,
            lookahead: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl<F: Fetch> Operator for Buffered<F> {
    fn open(&mut self) -> ExecResult<()> {
        self.lookahead = None;
        self.inner.open()?;
        self.open = true;
        Ok(())
    }

    fn has_next(&mut self) -> ExecResult<bool> {
        if !self.open {
            return Err(ExecError::NotOpen);
        }
        if self.lookahead.is_none() {
            self.lookahead = self.inner.fetch_next()?;
        }
        Ok(self.lookahead.is_some())
    }

    fn next(&mut self) -> ExecResult<Record> {
        if !self.has_next()? {
            return Err(ExecError::Exhausted);
        }
        self.lookahead.take().ok_or(ExecError::Exhausted)
    }

    fn close(&mut self) {
        self.inner.close();
        self.lookahead = None;
        self.open = false;
    }

    fn schema(&self) -> &RowSchema {
        self.inner.schema()
    }

    fn children(&self) -> Vec<&dyn Operator> {
        self.inner.children()
    }

    fn set_children(&mut self, children: Vec<Box<dyn Operator>>) -> ExecResult<()> {
        self.inner.set_children(children)
    }
}

/// Check that exactly `N` children were supplied
pub(crate) fn expect_children<const N: usize>(
    children: Vec<Box<dyn Operator>>,
) -> ExecResult<[Box<dyn Operator>; N]> {
    children
        .try_into()
        .map_err(|children: Vec<Box<dyn Operator>>| ExecError::ChildCount {
            expected: N,
            actual: children.len(),
        })
}
