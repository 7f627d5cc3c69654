use std::collections::{BTreeMap, HashMap};

use crate::dataset::{Cell, Table};

pub struct Summary {
    pub total: usize,
    pub mean_price: Option<f64>,
    pub mean_area: Option<f64>,
    pub mean_price_per_sqft: Option<f64>,
    /// Most common first; ties broken by name.
    pub categories: Vec<(String, usize)>,
    pub bedrooms: BTreeMap<i64, usize>,
    pub missing: Vec<(String, usize)>,
}

fn mean(table: &Table, column: &str) -> Option<f64> {
    let values: Vec<f64> = table.column(column).filter_map(Cell::as_f64).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn summarize(table: &Table) -> Summary {
    let mut categories: HashMap<String, usize> = HashMap::new();
    for cell in table.column("category") {
        if let Cell::Text(c) = cell {
            *categories.entry(c.clone()).or_default() += 1;
        }
    }
    let mut categories: Vec<_> = categories.into_iter().collect();
    categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut bedrooms = BTreeMap::new();
    for cell in table.column("bedroom_count") {
        if let Cell::Int(n) = cell {
            *bedrooms.entry(*n).or_default() += 1;
        }
    }

    let missing = table
        .columns
        .iter()
        .map(|c| (c.clone(), table.column(c).filter(|cell| cell.is_null()).count()))
        .collect();

    Summary {
        total: table.len(),
        mean_price: mean(table, "price_value"),
        mean_area: mean(table, "area_value"),
        mean_price_per_sqft: mean(table, "price_per_unit_area"),
        categories,
        bedrooms,
        missing,
    }
}

fn money(v: Option<f64>) -> String {
    v.map(|v| format!("₹{v:.2}")).unwrap_or_else(|| "-".into())
}

impl Summary {
    pub fn print(&self) {
        println!("\nDataset Statistics:");
        println!("  Total Properties:    {}", self.total);
        println!("  Average Price:       {}", money(self.mean_price));
        println!(
            "  Average Area:        {}",
            self.mean_area
                .map(|a| format!("{a:.2} sq ft"))
                .unwrap_or_else(|| "-".into())
        );
        println!("  Average Price/sq ft: {}", money(self.mean_price_per_sqft));

        println!("\nProperty Types:");
        for (category, n) in &self.categories {
            println!("  {:<20} {:>5}", category, n);
        }

        println!("\nBHK Distribution:");
        for (bhk, n) in &self.bedrooms {
            println!("  {:<20} {:>5}", bhk, n);
        }

        println!("\nMissing Values:");
        for (column, n) in &self.missing {
            println!("  {:<20} {:>5}", column, n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        let columns = ["id", "bedroom_count", "price_value", "area_value", "price_per_unit_area", "category"]
            .map(String::from)
            .to_vec();
        let row = |id: &str, bhk: Option<i64>, price: Option<f64>, area: Option<f64>, cat: Option<&str>| {
            vec![
                Cell::Text(id.into()),
                bhk.map_or(Cell::Null, Cell::Int),
                price.map_or(Cell::Null, Cell::Float),
                area.map_or(Cell::Null, Cell::Float),
                crate::dataset::price_per_unit_area(price, area).map_or(Cell::Null, Cell::Float),
                cat.map_or(Cell::Null, |c| Cell::Text(c.into())),
            ]
        };
        Table {
            columns,
            rows: vec![
                row("1", Some(2), Some(4e6), Some(1000.0), Some("Apartment")),
                row("2", Some(3), Some(8e6), Some(1000.0), Some("Villa")),
                row("3", Some(2), None, Some(500.0), Some("Apartment")),
            ],
        }
    }

    #[test]
    fn statistics_ignore_nulls() {
        let s = summarize(&table());
        assert_eq!(s.total, 3);
        assert_eq!(s.mean_price, Some(6e6));
        assert_eq!(s.mean_price_per_sqft, Some(6000.0));
        assert_eq!(
            s.categories,
            vec![("Apartment".to_string(), 2), ("Villa".to_string(), 1)]
        );
        assert_eq!(s.bedrooms.into_iter().collect::<Vec<_>>(), vec![(2, 2), (3, 1)]);

        let missing: HashMap<_, _> = s.missing.into_iter().collect();
        assert_eq!(missing["price_value"], 1);
        assert_eq!(missing["id"], 0);
    }

    #[test]
    fn empty_table_has_no_means() {
        let s = summarize(&Table::default());
        assert_eq!(s.total, 0);
        assert_eq!(s.mean_area, None);
        assert!(s.categories.is_empty());
    }
}
