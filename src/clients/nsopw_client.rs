//! NSOPW 客户端
//!
//! 全国登记系统的 JSON API：一次 POST，固定枚举全部辖区（部落 + 州/领地），
//! 城市、县和客户端 IP 按约定留空

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, AppError, AppResult};
use crate::models::Offender;

/// NSOPW 查询覆盖的全部辖区（与官方站点发出的请求一致）
pub const JURISDICTIONS: &[&str] = &[
    "ASTRIBE", "AKCHIN", "ACTRIBE", "BLACKFEET", "BOISFORTE", "CADDO", "CHEROKEE", "CATRIBES",
    "CHEYENNERIVER", "CHICKASAW", "CHIPPEWACREE", "CHITIMACHA", "POTAWATOMI", "COCOPAH", "CRIT",
    "COMANCHE", "CHEHALIS", "YAKAMA", "COLVILLETRIBES", "CTUIR", "WARMSPRINGS", "CROWNATIONS",
    "DNATION", "NCCHEROKEE", "ESTOO", "ELY", "FSST", "FTBELKNAP", "FTMCDOWELL",
    "MOJAVEINDIANTRIBE", "FORTPECKTRIBES", "GRIC", "GTB", "HAVASUPAI", "HOPI", "HUALAPAI",
    "IOWANATION", "JICARILLA", "KAIBABPAIUTE", "KALISPELTRIBE", "KAW", "SANTODOMINGO", "KBIC",
    "KICKAPOO", "ELWHA", "LUMMI", "MAKAH", "MPTN", "MITW", "MESCALEROAPACHE", "METLAKATLA",
    "MIAMINATION", "MICCOSUKEETRIBE", "CHOCTAW", "MODOC", "MUSCOGEE", "NAVAJO", "NEZPERCE",
    "NISQUALLY", "NOOKSACK", "NORTHERNARAPAHO", "NORTHERNCHEYENNE", "NHBPI", "OGLALA",
    "OHKAYOWINGEH", "OMAHA", "ONEIDA", "OSAGE", "OMTRIBE", "OTTAWATRIBE", "PASCUAYAQUI",
    "PAWNEENATION", "PEORIATRIBE", "PCI", "POKAGON", "PORTGAMBLE", "PBPNATION", "SANIPUEBLO",
    "PUEBLOOFACOMA", "ISLETA", "JEMEZ", "LAGUNA", "SANTAANA", "ZUNI", "PUYALLUPTRIBE", "PLPT",
    "QUAPAW", "QUINAULT", "REDLAKE", "RSIC", "ROSEBUD", "SACANDFOXNATION", "MESKWAKI", "SRPMIC",
    "SCAT", "SANTEE", "SAULTSAINTEMARIE", "SEMINOLENATION", "SCTRIBE", "SHOALWATERBAY",
    "SBTRIBES", "SHOSHONEPAIUTE", "SWO", "SKOKOMISH", "SPIRITLAKE", "SPOKANETRIBE",
    "SQUAXINISLAND", "SRST", "SUQUAMISH", "TEMOAKTRIBE", "MHANATION", "TONATION", "TONKAWA",
    "TONTOAPACHE", "TULALIP", "TMBCI", "UNITEDKEETOOWAHBAND", "UPPERSKAGIT", "UTETRIBE",
    "WAMPANOAG", "WASHOETRIBE", "WMAT", "WINNEBAGOTRIBE", "WYANDOTTE", "YANKTON",
    "YAVAPAIAPACHE", "YPIT", "AL", "AK", "AMERICANSAMOA", "AZ", "AR", "CA", "CO", "CT", "DE",
    "DC", "FL", "GA", "GU", "HI", "ID", "IL", "IN", "IA", "KS", "KY", "LA", "ME", "MD", "MA",
    "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY", "NC", "ND", "CNMI", "OH",
    "OK", "OR", "PA", "PR", "RI", "SC", "SD", "TN", "TX", "USVI", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY",
];

#[derive(Serialize)]
struct SearchPayload<'a> {
    #[serde(rename = "firstName")]
    first_name: &'a str,
    #[serde(rename = "lastName")]
    last_name: &'a str,
    city: &'a str,
    county: &'a str,
    jurisdictions: &'a [&'a str],
    #[serde(rename = "clientIp")]
    client_ip: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    offenders: Vec<Offender>,
}

/// NSOPW API 客户端
pub struct NsopwClient {
    http: reqwest::Client,
    api_url: String,
}

impl NsopwClient {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
        }
    }

    /// 按姓名查询，返回 offender 列表（可能为空）
    pub async fn search(&self, first_name: &str, last_name: &str) -> AppResult<Vec<Offender>> {
        let payload = SearchPayload {
            first_name,
            last_name,
            city: "",
            county: "",
            jurisdictions: JURISDICTIONS,
            client_ip: "",
        };
        debug!("NSOPW 查询: {} {}", first_name, last_name);

        let response = self
            .http
            .post(&self.api_url)
            .header("accept", "application/json, text/javascript, */*; q=0.01")
            .header("referer", "https://www.nsopw.gov/")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                AppError::Api(ApiError::RequestFailed {
                    endpoint: self.api_url.clone(),
                    source: Box::new(e),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Api(ApiError::BadStatus {
                endpoint: self.api_url.clone(),
                status: status.as_u16(),
            }));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            AppError::Api(ApiError::JsonParseFailed {
                source: Box::new(e),
            })
        })?;
        debug!("NSOPW 返回 {} 条 offender", parsed.offenders.len());
        Ok(parsed.offenders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jurisdiction_list_shape() {
        // 部落辖区在前，州/领地在后，Utah 必须在内
        assert_eq!(JURISDICTIONS.len(), 183);
        assert!(JURISDICTIONS.contains(&"UT"));
        assert!(JURISDICTIONS.contains(&"NAVAJO"));
        assert_eq!(JURISDICTIONS.last(), Some(&"WY"));
    }

    #[test]
    fn test_payload_field_names() {
        let payload = SearchPayload {
            first_name: "John",
            last_name: "Smith",
            city: "",
            county: "",
            jurisdictions: &["UT"],
            client_ip: "",
        };
        let json = serde_json::to_value(&payload).expect("序列化失败");
        assert_eq!(json["firstName"], "John");
        assert_eq!(json["lastName"], "Smith");
        assert_eq!(json["clientIp"], "");
        assert_eq!(json["jurisdictions"][0], "UT");
    }

    #[test]
    fn test_response_parses_with_missing_offenders() {
        let parsed: SearchResponse = serde_json::from_str("{}").expect("解析失败");
        assert!(parsed.offenders.is_empty());
    }
}
