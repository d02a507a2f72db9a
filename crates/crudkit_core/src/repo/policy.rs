//! Per-operation authorization hooks.
//!
//! Every predicate defaults to approval; a `false` answer is the only path
//! that makes a repository raise `AccessDenied`.

use crate::model::record::{Fields, Record};

/// Injectable authorization policy for one resource type.
///
/// Implement only the predicates that need a rule; the rest keep approving.
pub trait AccessPolicy {
    fn can_show(&self, _record: &Record) -> bool {
        true
    }

    fn can_create(&self, _params: &Fields) -> bool {
        true
    }

    fn can_update(&self, _record: &Record, _params: &Fields) -> bool {
        true
    }

    fn can_delete(&self, _record: &Record) -> bool {
        true
    }

    fn can_restore(&self, _record: &Record) -> bool {
        true
    }
}

/// Policy approving every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {}

impl<P: AccessPolicy + ?Sized> AccessPolicy for &P {
    fn can_show(&self, record: &Record) -> bool {
        (**self).can_show(record)
    }

    fn can_create(&self, params: &Fields) -> bool {
        (**self).can_create(params)
    }

    fn can_update(&self, record: &Record, params: &Fields) -> bool {
        (**self).can_update(record, params)
    }

    fn can_delete(&self, record: &Record) -> bool {
        (**self).can_delete(record)
    }

    fn can_restore(&self, record: &Record) -> bool {
        (**self).can_restore(record)
    }
}
