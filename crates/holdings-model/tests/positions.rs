use holdings_model::{
    derive, total_loss, total_profit, write_positions_csv, ColumnMap, NormalizedTable,
    PortfolioSummary, Value,
};
use pretty_assertions::assert_eq;

fn holdings_table(rows: &[[&str; 4]]) -> NormalizedTable {
    let columns = ["Company Name", "Total Quantity", "Avg Trading Price", "LTP"]
        .into_iter()
        .map(String::from)
        .collect();
    let rows = rows
        .iter()
        .map(|r| r.iter().map(|s| Value::from(*s)).collect())
        .collect();
    NormalizedTable::new(columns, rows).expect("well-formed table")
}

#[test]
fn acme_example_counts_toward_total_profit() {
    let table = holdings_table(&[["Acme", "10", "100", "120"]]);
    let positions = derive(&table, &ColumnMap::default()).unwrap();

    assert_eq!(positions.len(), 1);
    assert_eq!(format!("{:.2}", positions[0].profit_loss.unwrap()), "200.00");
    assert_eq!(total_profit(&positions), 200.0);
    assert_eq!(total_loss(&positions), 0.0);
}

#[test]
fn zero_ltp_row_is_excluded_everywhere() {
    let table = holdings_table(&[["Acme", "10", "100", "0"], ["Globex", "2", "50", "45"]]);
    let positions = derive(&table, &ColumnMap::default()).unwrap();

    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].name, "Globex");
    assert_eq!(total_profit(&positions), 0.0);
    assert_eq!(total_loss(&positions), -10.0);

    let summary = PortfolioSummary::from_positions(&positions);
    assert_eq!(summary.positions, 1);
    assert_eq!(summary.losers, 1);
}

#[test]
fn malformed_numbers_do_not_fail_the_table() {
    let table = holdings_table(&[
        ["Acme", "ten", "100", "120"],
        ["Globex", "5", "", "60"],
        ["Initech", " 4 ", " 10 ", " 11 "],
    ]);
    let positions = derive(&table, &ColumnMap::default()).unwrap();

    assert_eq!(positions.len(), 3);
    assert_eq!(positions[0].profit_loss, None);
    assert_eq!(positions[1].profit_loss, None);
    assert_eq!(positions[2].profit_loss, Some(4.0));
    assert_eq!(total_profit(&positions), 4.0);
}

#[test]
fn derived_positions_export_as_csv() {
    let table = holdings_table(&[["Acme", "10", "100", "120"], ["Globex", "5", "50", "40"]]);
    let positions = derive(&table, &ColumnMap::default()).unwrap();

    let mut out = Vec::new();
    write_positions_csv(&positions, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "name,quantity,avg_cost,ltp,profit_loss\nAcme,10,100,120,200\nGlobex,5,50,40,-50\n"
    );
}
