use crate::operation::Operation;
use indexmap::IndexMap;

/// Withdrawal-only batch reorder applied when `gas_optimization_enabled`
/// (§4.3 "Gas optimization"):
///
/// 1. Sort by `amount / estimatedGas` descending.
/// 2. Group by `(token, recipient)`.
/// 3. Within each group, move zero-amount entries first.
/// 4. Concatenate groups in first-seen order.
///
/// `estimatedGas` is never populated by the ingest path (§9 open
/// question); this treats it as its advisory default of `1`, which
/// collapses step 1 to a plain descending sort by amount. Step 3 is kept
/// faithful to §4.3 even though `validate_amount_and_parties` rejects
/// zero amounts upstream, so no operation reaching this function will
/// actually have `amount == 0` today.
pub fn optimize_for_gas(mut ops: Vec<Operation>) -> Vec<Operation> {
    ops.sort_by(|a, b| b.amount.cmp(&a.amount));

    let mut groups: IndexMap<(Option<String>, String), Vec<Operation>> = IndexMap::new();
    for op in ops {
        groups.entry((op.token.clone(), op.recipient.clone())).or_default().push(op);
    }

    let mut out = Vec::new();
    for (_, mut group) in groups {
        group.sort_by_key(|op| if op.amount == 0 { 0 } else { 1 });
        out.extend(group);
    }
    out
}
