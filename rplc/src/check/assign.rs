//! Assignment compatibility: a value's regions must be included in the
//! regions of the location it is stored into.

use tracing::debug;

use super::collect::Flow;
use crate::diagnostics::{Category, Diagnostic, Diagnostics, Payload};
use crate::rpl::is_included_in;

/// One `invalid-assignment` warning per flow with an incompatible slot.
pub fn check_assignments(flows: &[Flow], diagnostics: &mut Diagnostics) {
    let mut invalid = 0;
    for flow in flows {
        let Some((target, source)) = flow.pairs().find(|(target, source)| !is_included_in(source, target)) else {
            continue;
        };
        invalid += 1;
        diagnostics.push(
            Diagnostic::new(
                Category::InvalidAssignment,
                format!("value in region `{source}` is stored where `{target}` is expected"),
                flow.span,
            )
            .with_decl(flow.function)
            .with_payload(Payload::Rpl { rpl: source.clone() }),
        );
    }
    debug!(flows = flows.len(), invalid, "checked assignment compatibility");
}
