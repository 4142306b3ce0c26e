//! 报表数据投影能力
//!
//! 把名册和各自的最新查询记录拼成行数据，名册里没查过的成员也要出现在
//! 报表中（标记为 Not checked）。只做数据投影，不负责 CSV 字节格式

use crate::models::{RegistryOutcome, SearchRecord};
use crate::storage::ResultStore;

/// 报表行
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub name: String,
    pub date_checked: String,
    pub nsopw_results: String,
    pub ucaor_results: String,
    pub confirmation_status: String,
    pub counselor1: String,
    pub counselor2: String,
    pub notes: String,
}

impl ReportRow {
    fn unchecked(name: String) -> Self {
        Self {
            name,
            date_checked: "Not checked".to_string(),
            nsopw_results: "Not checked".to_string(),
            ucaor_results: "Not checked".to_string(),
            confirmation_status: "Not processed".to_string(),
            counselor1: String::new(),
            counselor2: String::new(),
            notes: String::new(),
        }
    }

    fn from_record(name: String, record: &SearchRecord) -> Self {
        let (confirmation_status, counselor1, counselor2) = match &record.confirmed {
            Some(c) => (
                if c.positive_match {
                    "Confirmed MATCH".to_string()
                } else {
                    "Confirmed NO MATCH".to_string()
                },
                if c.confirmed_by.counselor1 { "Yes" } else { "No" }.to_string(),
                if c.confirmed_by.counselor2 { "Yes" } else { "No" }.to_string(),
            ),
            None => ("Pending confirmation".to_string(), String::new(), String::new()),
        };

        let nsopw_results = record
            .nsopw
            .as_ref()
            .map(RegistryOutcome::summary)
            .unwrap_or_else(|| "Not searched".to_string());
        let ucaor_results = record
            .ucaor
            .as_ref()
            .map(RegistryOutcome::summary)
            .unwrap_or_else(|| "Not searched".to_string());

        // 有命中时把 offender 姓名附在备注里
        let notes = match &record.nsopw {
            Some(RegistryOutcome::Offenders { offenders }) if !offenders.is_empty() => {
                let names: Vec<String> = offenders.iter().map(|o| o.display_name()).collect();
                format!("NSOPW offender names: {}", names.join(", "))
            }
            _ => String::new(),
        };

        Self {
            name,
            date_checked: record.timestamp.clone(),
            nsopw_results,
            ucaor_results,
            confirmation_status,
            counselor1,
            counselor2,
            notes,
        }
    }
}

/// 构建报表：名册全员各一行，取各自的最新记录
pub fn build_report(store: &ResultStore) -> Vec<ReportRow> {
    store
        .members()
        .iter()
        .map(|member| {
            let name = member.full_name();
            match store.latest_record_for(&member.identity_key()) {
                Some(record) => ReportRow::from_record(name, &record),
                None => ReportRow::unchecked(name),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        make_search_key, CertificationStatus, Confirmation, ConfirmedBy, Member, Offender,
        OffenderName,
    };

    fn temp_store(tag: &str) -> ResultStore {
        let path = std::env::temp_dir().join(format!(
            "report_test_{}_{}.json",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        ResultStore::open(path).expect("打开存储失败")
    }

    #[test]
    fn test_unchecked_member_row() {
        let store = temp_store("unchecked");
        store
            .set_members(&[Member::new("John", "Smith", Some(42))])
            .expect("写入失败");

        let rows = build_report(&store);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "John Smith");
        assert_eq!(rows[0].date_checked, "Not checked");
        assert_eq!(rows[0].confirmation_status, "Not processed");
    }

    #[test]
    fn test_confirmed_row_with_offender_notes() {
        let store = temp_store("confirmed");
        store
            .set_members(&[Member::new("John", "Smith", Some(42))])
            .expect("写入失败");

        let ts = "2024-03-01T10:00:00Z";
        let record = SearchRecord {
            search_key: make_search_key(ts),
            searched_name: "john smith".to_string(),
            timestamp: ts.to_string(),
            nsopw: Some(RegistryOutcome::Offenders {
                offenders: vec![Offender {
                    name: OffenderName {
                        given_name: Some("John".to_string()),
                        middle_name: None,
                        sur_name: Some("Smith".to_string()),
                    },
                    ..Default::default()
                }],
            }),
            ucaor: Some(RegistryOutcome::Unknown),
            confirmed: Some(Confirmation {
                confirmed_by: ConfirmedBy {
                    counselor1: true,
                    counselor2: true,
                },
                positive_match: true,
                timestamp: ts.to_string(),
            }),
            certification_status: CertificationStatus::Pending,
        };
        store.put_record(&record).expect("写入失败");

        let rows = build_report(&store);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].confirmation_status, "Confirmed MATCH");
        assert_eq!(rows[0].counselor1, "Yes");
        assert_eq!(rows[0].ucaor_results, "Result undetermined");
        assert!(rows[0].notes.contains("John Smith"));
    }
}
