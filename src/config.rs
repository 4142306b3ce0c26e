/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 持久化存储文件路径
    pub store_path: String,
    /// 名册 TOML 文件路径（文件导入方式）
    pub roster_toml: String,
    /// 导入时是否要求成员必须带年龄
    pub require_age: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- NSOPW（联邦登记系统 API）配置 ---
    pub nsopw_api_url: String,
    // --- UCAOR（犹他州登记系统，HTML 抓取）配置 ---
    pub ucaor_base_url: String,
    pub ucaor_agency_id: String,
    // --- LCR（认证目标系统）配置 ---
    pub lcr_member_list_url: String,
    pub lcr_profile_base_url: String,
    pub member_lookup_api_url: String,
    /// 要写入的认证名称（用于已存在判断的模糊匹配）
    pub certification_name: String,
    pub certification_document_id: String,
    pub certification_expiration: String,
    // --- 等待 / 重试 配置 ---
    /// 固定渲染等待时长（目标页面无就绪信号）
    pub page_settle_ms: u64,
    /// 尽力等待的总超时
    pub wait_timeout_ms: u64,
    /// 尽力等待的轮询间隔
    pub wait_poll_interval_ms: u64,
    /// 单个认证条目的最大尝试次数（失败重排队上限）
    pub certification_max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 2001,
            store_path: "registry_store.json".to_string(),
            roster_toml: "members.toml".to_string(),
            require_age: true,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            nsopw_api_url: "https://nsopw-api.ojp.gov/nsopw/v1/v1.0/search".to_string(),
            ucaor_base_url: "https://www.icrimewatch.net/results.php".to_string(),
            ucaor_agency_id: "56564".to_string(),
            lcr_member_list_url:
                "https://lcr.churchofjesuschrist.org/records/member-list?lang=eng".to_string(),
            lcr_profile_base_url: "https://lcr.churchofjesuschrist.org/records/member-profile"
                .to_string(),
            member_lookup_api_url: "https://mltp-api.churchofjesuschrist.org/api/member-lookup"
                .to_string(),
            certification_name: "Utah 2024 Youth Service Organizations".to_string(),
            certification_document_id: "NA".to_string(),
            certification_expiration: "NA".to_string(),
            page_settle_ms: 2000,
            wait_timeout_ms: 8000,
            wait_poll_interval_ms: 500,
            certification_max_attempts: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            store_path: std::env::var("STORE_PATH").unwrap_or(default.store_path),
            roster_toml: std::env::var("ROSTER_TOML").unwrap_or(default.roster_toml),
            require_age: std::env::var("REQUIRE_AGE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.require_age),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            nsopw_api_url: std::env::var("NSOPW_API_URL").unwrap_or(default.nsopw_api_url),
            ucaor_base_url: std::env::var("UCAOR_BASE_URL").unwrap_or(default.ucaor_base_url),
            ucaor_agency_id: std::env::var("UCAOR_AGENCY_ID").unwrap_or(default.ucaor_agency_id),
            lcr_member_list_url: std::env::var("LCR_MEMBER_LIST_URL").unwrap_or(default.lcr_member_list_url),
            lcr_profile_base_url: std::env::var("LCR_PROFILE_BASE_URL").unwrap_or(default.lcr_profile_base_url),
            member_lookup_api_url: std::env::var("MEMBER_LOOKUP_API_URL").unwrap_or(default.member_lookup_api_url),
            certification_name: std::env::var("CERTIFICATION_NAME").unwrap_or(default.certification_name),
            certification_document_id: std::env::var("CERTIFICATION_DOCUMENT_ID").unwrap_or(default.certification_document_id),
            certification_expiration: std::env::var("CERTIFICATION_EXPIRATION").unwrap_or(default.certification_expiration),
            page_settle_ms: std::env::var("PAGE_SETTLE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.page_settle_ms),
            wait_timeout_ms: std::env::var("WAIT_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.wait_timeout_ms),
            wait_poll_interval_ms: std::env::var("WAIT_POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.wait_poll_interval_ms),
            certification_max_attempts: std::env::var("CERTIFICATION_MAX_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.certification_max_attempts),
        }
    }
}
