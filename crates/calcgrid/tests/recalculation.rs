//! Tests for incremental recalculation and circular reference handling

use calcgrid::prelude::*;
use pretty_assertions::assert_eq;

fn at(row: i64, col: i64) -> CellAddress {
    CellAddress::by_index(row, col, Some(0))
}

/// A = 16 at (1, 1), B = A + 5 at (2, 2), C = B + 6 at (3, 3)
fn chain() -> Workbook {
    let mut wb = Workbook::new();
    wb.set_input(&at(1, 1), "16").unwrap();
    wb.set_input(&at(2, 2), "=value(positional(1, 1)) + 5").unwrap();
    wb.set_input(&at(3, 3), "=value(positional(2, 2)) + 6").unwrap();
    wb
}

#[test]
fn test_chain_propagation() {
    let mut wb = chain();
    assert_eq!(wb.get_value(&at(2, 2)).unwrap(), Value::Number(21.0));
    assert_eq!(wb.get_value(&at(3, 3)).unwrap(), Value::Number(27.0));

    let stats = wb.set_input(&at(1, 1), "3").unwrap();
    assert_eq!(stats.cells_recomputed, 2);
    assert_eq!(stats.consumers_visited, 2);

    assert_eq!(wb.get_value(&at(1, 1)).unwrap(), Value::Number(3.0));
    assert_eq!(wb.get_value(&at(2, 2)).unwrap(), Value::Number(8.0));
    assert_eq!(wb.get_value(&at(3, 3)).unwrap(), Value::Number(14.0));
}

#[test]
fn test_circular_reference_leaves_state_unchanged() {
    let mut wb = chain();
    let a = wb.cell_key(&at(1, 1)).unwrap().unwrap();
    let b = wb.cell_key(&at(2, 2)).unwrap().unwrap();
    let c = wb.cell_key(&at(3, 3)).unwrap().unwrap();

    let err = wb
        .set_input(&at(1, 1), "=value(positional(3, 3)) + 1")
        .unwrap_err();
    assert!(err.is_circular_reference());
    assert_eq!(wb.calc_depth(), 0);

    assert_eq!(wb.get_input(&at(1, 1)).unwrap().as_deref(), Some("16"));
    assert_eq!(wb.get_value(&at(1, 1)).unwrap(), Value::Number(16.0));
    assert_eq!(wb.get_value(&at(2, 2)).unwrap(), Value::Number(21.0));
    assert_eq!(wb.get_value(&at(3, 3)).unwrap(), Value::Number(27.0));

    assert!(wb.providers(&at(1, 1)).unwrap().is_empty());
    assert_eq!(wb.consumers(&at(1, 1)).unwrap(), vec![b]);
    assert_eq!(wb.providers(&at(2, 2)).unwrap(), vec![a]);
    assert_eq!(wb.consumers(&at(2, 2)).unwrap(), vec![c]);
    assert_eq!(wb.providers(&at(3, 3)).unwrap(), vec![b]);
    assert!(wb.consumers(&at(3, 3)).unwrap().is_empty());
    wb.check_dependencies().unwrap();

    // The graph still works afterwards
    wb.set_input(&at(1, 1), "3").unwrap();
    assert_eq!(wb.get_value(&at(3, 3)).unwrap(), Value::Number(14.0));
}

#[test]
fn test_circular_reference_over_formula() {
    let mut wb = chain();
    wb.set_input(&at(2, 2), "=value(positional(1, 1)) * 2").unwrap();

    // Replacing a formula with a cyclic one keeps the old formula
    let err = wb
        .set_input(&at(2, 2), "=value(positional(3, 3))")
        .unwrap_err();
    assert!(err.is_circular_reference());
    assert_eq!(
        wb.get_input(&at(2, 2)).unwrap().as_deref(),
        Some("=value(positional(1, 1)) * 2")
    );

    wb.set_input(&at(1, 1), "1").unwrap();
    assert_eq!(wb.get_value(&at(2, 2)).unwrap(), Value::Number(2.0));
    assert_eq!(wb.get_value(&at(3, 3)).unwrap(), Value::Number(8.0));
}

#[test]
fn test_repeated_input_is_idempotent() {
    let mut wb = chain();
    let first = wb.set_input(&at(1, 1), "7").unwrap();
    let values: Vec<Value> = [at(2, 2), at(3, 3)]
        .iter()
        .map(|address| wb.get_value(address).unwrap())
        .collect();

    let second = wb.set_input(&at(1, 1), "7").unwrap();
    assert_eq!(second.cells_recomputed, first.cells_recomputed);
    assert_eq!(second.run_id, first.run_id + 1);
    for (address, value) in [at(2, 2), at(3, 3)].iter().zip(values) {
        assert_eq!(wb.get_value(address).unwrap(), value);
    }
}

#[test]
fn test_reads_outside_a_run_do_not_recalculate() {
    let mut wb = chain();
    let run = wb.current_run_id();
    wb.get_value(&at(3, 3)).unwrap();
    wb.get_value(&at(3, 3)).unwrap();
    assert_eq!(wb.current_run_id(), run);
}

#[test]
fn test_redefinition_drops_old_edges() {
    let mut wb = chain();
    wb.set_input(&at(0, 0), "100").unwrap();
    wb.set_input(&at(2, 2), "=value(positional(0, 0))").unwrap();

    assert!(wb.consumers(&at(1, 1)).unwrap().is_empty());
    assert_eq!(wb.consumers(&at(0, 0)).unwrap().len(), 1);
    assert_eq!(wb.get_value(&at(3, 3)).unwrap(), Value::Number(106.0));

    // Changing the old provider no longer touches the chain
    let stats = wb.set_input(&at(1, 1), "0").unwrap();
    assert_eq!(stats.cells_recomputed, 0);
    assert_eq!(stats.consumers_visited, 0);
}

#[test]
fn test_cross_sheet_references() {
    let mut wb = Workbook::new();
    let source = CellAddress::by_index(0, 0, Some(1));
    wb.set_input(&source, "2").unwrap();
    wb.set_input(&at(0, 0), "=value(positional(0, 0, 1)) * 10")
        .unwrap();
    assert_eq!(wb.get_value(&at(0, 0)).unwrap(), Value::Number(20.0));

    wb.set_input(&source, "3").unwrap();
    assert_eq!(wb.get_value(&at(0, 0)).unwrap(), Value::Number(30.0));
    assert_eq!(
        wb.get_input(&at(0, 0)).unwrap().as_deref(),
        Some("=value(positional(0, 0, 1)) * 10")
    );
}

#[test]
fn test_stable_addresses() {
    let mut wb = chain();
    let stable = wb.to_stable_address(&at(2, 2)).unwrap();
    assert!(stable.is_stable());

    wb.insert_rows(0, 0, 5).unwrap();
    assert_eq!(wb.get_value(&stable).unwrap(), Value::Number(21.0));
    assert_eq!(wb.get_value(&at(7, 2)).unwrap(), Value::Number(21.0));
}
