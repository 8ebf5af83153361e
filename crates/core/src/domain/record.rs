use serde::{Deserialize, Serialize};

pub const DEFAULT_DISPLAY_NAME: &str = "ลูกค้า";
pub const DEFAULT_STATUS: &str = "ไม่มีข้อมูล";
pub const DEFAULT_PRICE: &str = "0";

/// One roster row, keyed by the sender's identity key. Column layout:
/// A identity key, B nickname, C display name, D status, E price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub identity_key: String,
    /// Column B. Reserved; nothing reads it yet.
    pub nickname: Option<String>,
    pub display_name: String,
    pub status: String,
    pub price: String,
}

impl CustomerRecord {
    /// Builds a record from a raw sheet row. Missing or blank cells degrade
    /// to defaults; they never fail the pipeline.
    pub fn from_row(row: &[String]) -> Self {
        Self {
            identity_key: cell(row, 0).unwrap_or_default(),
            nickname: cell(row, 1),
            display_name: cell(row, 2).unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            status: cell(row, 3).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            price: cell(row, 4).unwrap_or_else(|| DEFAULT_PRICE.to_string()),
        }
    }
}

fn cell(row: &[String], index: usize) -> Option<String> {
    row.get(index).map(|value| value.trim()).filter(|value| !value.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{CustomerRecord, DEFAULT_DISPLAY_NAME, DEFAULT_PRICE, DEFAULT_STATUS};

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|cell| (*cell).to_string()).collect()
    }

    #[test]
    fn full_row_maps_positionally() {
        let record =
            CustomerRecord::from_row(&row(&["U123", "Tom", "สมชาย", "รอดำเนินการ", "250"]));

        assert_eq!(record.identity_key, "U123");
        assert_eq!(record.nickname.as_deref(), Some("Tom"));
        assert_eq!(record.display_name, "สมชาย");
        assert_eq!(record.status, "รอดำเนินการ");
        assert_eq!(record.price, "250");
    }

    #[test]
    fn short_row_degrades_to_defaults() {
        let record = CustomerRecord::from_row(&row(&["U123", "Tom"]));

        assert_eq!(record.display_name, DEFAULT_DISPLAY_NAME);
        assert_eq!(record.status, DEFAULT_STATUS);
        assert_eq!(record.price, DEFAULT_PRICE);
    }

    #[test]
    fn blank_cells_are_treated_as_absent() {
        let record = CustomerRecord::from_row(&row(&["U123", "", "  ", "ซักเสร็จแล้ว", ""]));

        assert_eq!(record.nickname, None);
        assert_eq!(record.display_name, DEFAULT_DISPLAY_NAME);
        assert_eq!(record.status, "ซักเสร็จแล้ว");
        assert_eq!(record.price, DEFAULT_PRICE);
    }
}
