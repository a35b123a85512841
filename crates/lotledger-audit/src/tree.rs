//! Genealogy view of a lot store.

use lotledger_core::{LotId, LotStore};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Render every lot as an indented tree, roots first in store order.
///
/// Each line is the lot's display form; children are indented two spaces
/// below their source lot, in creation order.
pub fn lot_tree(store: &LotStore) -> String {
    let children = store.child_index();
    let mut out = String::new();
    for root in store.roots() {
        write_lot(store, &children, root.id, 0, &mut out);
    }
    out
}

fn write_lot(
    store: &LotStore,
    children: &BTreeMap<LotId, Vec<LotId>>,
    id: LotId,
    depth: usize,
    out: &mut String,
) {
    let Some(lot) = store.get(id) else {
        return;
    };
    let _ = writeln!(out, "{:indent$}{lot}", "", indent = depth * 2);
    for child in children.get(&id).into_iter().flatten() {
        write_lot(store, children, *child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lotledger_core::{Lot, Placement, TxnId, TxnRef};
    use rust_decimal_macros::dec;

    #[test]
    fn test_children_indented_under_parent() {
        let mut store = LotStore::new("VTI");
        let acquired = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let parent = Lot::new(
            store.next_lot_id(),
            "A",
            "VTI",
            dec!(100),
            dec!(1000),
            acquired,
            TxnRef::Ledger(TxnId(1)),
        );
        store.insert(parent.clone(), Placement::ByAcquisition).unwrap();
        let by = TxnRef::Ledger(TxnId(2));
        let child = parent.derive(store.next_lot_id(), parent.account.clone(), dec!(40), dec!(400), by);
        store.insert(child, Placement::After(LotId(0))).unwrap();
        store.close(LotId(0), by).unwrap();

        let tree = lot_tree(&store);
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "L0 A 100 sh VTI cost 1000 acquired 2024-01-02 [closed by T2]"
        );
        assert_eq!(lines[1], "  L1 A 40 sh VTI cost 400 acquired 2024-01-02 [open]");
    }

    #[test]
    fn test_empty_store() {
        assert_eq!(lot_tree(&LotStore::new("VTI")), "");
    }
}
