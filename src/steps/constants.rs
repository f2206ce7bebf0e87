// src/steps/constants.rs

/// Job data key under which the account step stores the account entity.
pub const ACCOUNT_ENTITY_KEY: &str = "ACCOUNT_ENTITY";

pub mod steps {
	pub const ACCOUNT: &str = "fetch-account";
	pub const ASSETS: &str = "fetch-assets";
	pub const FINDINGS: &str = "fetch-findings";
}

pub mod entities {
	pub const ACCOUNT_TYPE: &str = "cve_account";
	pub const ACCOUNT_CLASS: &str = "Account";

	pub const ASSET_TYPE: &str = "cve_asset";
	pub const ASSET_CLASS: &str = "Device";

	pub const FINDING_TYPE: &str = "cve_finding";
	pub const FINDING_CLASS: &str = "Finding";

	/// Catalog entity type targeted by mapped relationships.
	pub const CVE_TYPE: &str = "cve";
}

pub mod relationships {
	pub const HAS: &str = "HAS";
	pub const IS: &str = "IS";

	pub const ACCOUNT_HAS_ASSET: &str = "cve_account_has_cve_asset";
	pub const ACCOUNT_HAS_FINDING: &str = "cve_account_has_cve_finding";
	pub const ASSET_HAS_FINDING: &str = "cve_asset_has_cve_finding";
	pub const FINDING_IS_CVE: &str = "cve_finding_is_cve";
}
