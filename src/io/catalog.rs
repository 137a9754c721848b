use crate::types::{BoundingBox, Granule, PipelineError, PipelineResult, SourceProjection};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// Default CMR granule search endpoint
pub const DEFAULT_CMR_URL: &str = "https://cmr.earthdata.nasa.gov/search/granules.umm_json";

/// Granule search request
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Collection short name, e.g. "SWOT_L2_HR_Raster_2.0"
    pub short_name: String,
    /// Spatial filter in lon/lat degrees
    pub bounding_box: BoundingBox,
    /// Wildcard granule-name filter, e.g. "*100m*PIC*_01"
    pub granule_pattern: String,
    /// Temporal window (inclusive dates, UTC)
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Substring a data URL must contain to be downloadable
    pub url_substring: String,
}

/// UMM-JSON search response structures (only the fields the pipeline reads)
#[derive(Debug, Deserialize)]
struct UmmSearchResponse {
    items: Vec<UmmItem>,
}

#[derive(Debug, Deserialize)]
struct UmmItem {
    meta: UmmMeta,
    umm: UmmRecord,
}

#[derive(Debug, Deserialize)]
struct UmmMeta {
    #[serde(rename = "native-id")]
    native_id: String,
}

#[derive(Debug, Deserialize)]
struct UmmRecord {
    #[serde(rename = "TemporalExtent")]
    temporal_extent: TemporalExtent,
    #[serde(rename = "RelatedUrls", default)]
    related_urls: Vec<RelatedUrl>,
}

#[derive(Debug, Deserialize)]
struct TemporalExtent {
    #[serde(rename = "RangeDateTime")]
    range_date_time: RangeDateTime,
}

#[derive(Debug, Deserialize)]
struct RangeDateTime {
    #[serde(rename = "EndingDateTime")]
    ending_date_time: String,
}

#[derive(Debug, Deserialize)]
struct RelatedUrl {
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "Type", default)]
    url_type: String,
}

/// CMR catalog client for granule discovery
pub struct CatalogClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl CatalogClient {
    pub fn new() -> PipelineResult<Self> {
        Self::with_base_url(DEFAULT_CMR_URL)
    }

    /// Point the client at a non-default endpoint (tests, mirrors)
    pub fn with_base_url(base_url: &str) -> PipelineResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent("swotpipe/0.2.0 (SWOT WSE Ingestion Pipeline)")
            .build()
            .map_err(|e| PipelineError::Catalog(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.to_string(),
            client,
        })
    }

    /// Query the catalog for granules matching the search parameters.
    ///
    /// A failed query (network, auth, malformed response) is fatal for the
    /// run and surfaces as `PipelineError::Catalog`; granules without a
    /// usable data URL are dropped, and results are deduplicated by
    /// acquisition date. No ordering is guaranteed.
    pub fn search(&self, params: &SearchParams) -> PipelineResult<Vec<Granule>> {
        let bbox = params.bounding_box;
        let bounding_box = format!(
            "{},{},{},{}",
            bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat
        );
        let temporal = format!("{},{}", params.start, params.end);

        log::debug!(
            "CMR query: short_name={} bbox={} temporal={} pattern={}",
            params.short_name,
            bounding_box,
            temporal,
            params.granule_pattern
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("short_name", params.short_name.as_str()),
                ("bounding_box", bounding_box.as_str()),
                ("temporal", temporal.as_str()),
                ("readable_granule_name", params.granule_pattern.as_str()),
                ("options[readable_granule_name][pattern]", "true"),
                ("page_size", "2000"),
            ])
            .send()
            .map_err(|e| PipelineError::Catalog(format!("CMR request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PipelineError::Catalog(format!(
                "CMR returned HTTP {} for {}",
                response.status().as_u16(),
                self.base_url
            )));
        }

        let body: UmmSearchResponse = response
            .json()
            .map_err(|e| PipelineError::Catalog(format!("Malformed CMR response: {}", e)))?;

        Ok(collect_granules(body, &params.url_substring))
    }
}

/// Turn decoded catalog items into granules: URL filter, native-id parse,
/// per-date deduplication (first seen wins).
fn collect_granules(body: UmmSearchResponse, url_substring: &str) -> Vec<Granule> {
    let mut seen_dates: HashSet<NaiveDate> = HashSet::new();
    let mut granules = Vec::new();

    for item in body.items {
        let native_id = item.meta.native_id;

        let data_urls: Vec<String> = item
            .umm
            .related_urls
            .iter()
            .filter(|u| u.url_type.eq_ignore_ascii_case("GET DATA"))
            .filter(|u| u.url.contains(url_substring))
            .map(|u| u.url.clone())
            .collect();
        if data_urls.is_empty() {
            log::debug!("Granule {} has no matching data URL, discarding", native_id);
            continue;
        }

        let ending = &item.umm.temporal_extent.range_date_time.ending_date_time;
        let acquisition_date = match parse_utc_date(ending) {
            Some(date) => date,
            None => {
                log::warn!(
                    "Granule {} has unparseable ending datetime '{}', discarding",
                    native_id,
                    ending
                );
                continue;
            }
        };

        if !seen_dates.insert(acquisition_date) {
            log::debug!(
                "Granule {} duplicates date {}, keeping the first one found",
                native_id,
                acquisition_date
            );
            continue;
        }

        let (source_projection, tile_id) = parse_native_id(&native_id);
        log::info!("Found granule with date: {}", acquisition_date);

        granules.push(Granule {
            native_id,
            tile_id,
            acquisition_date,
            source_projection,
            data_urls,
        });
    }

    granules
}

/// Parse a CMR ending datetime such as "2024-03-10T12:00:21.000Z"
fn parse_utc_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    let trimmed = s.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

/// Extract the declared UTM zone tag and tile identifier from a native-id.
///
/// SWOT raster native-ids look like
/// `SWOT_L2_HR_Raster_100m_UTM45V_N_x_x_x_009_023_131F_..._PIC0_01`:
/// the zone rides in the `UTM<nn>` token and the tile id is the
/// pass/scene segment between `x_x_x_` and `F`. Missing pieces degrade to
/// `Unknown` / the full native-id, they never fail discovery.
pub fn parse_native_id(native_id: &str) -> (SourceProjection, String) {
    let zone_re = Regex::new(r"UTM(\d{1,2})").expect("static regex");
    let projection = zone_re
        .captures(native_id)
        .and_then(|c| c[1].parse::<u8>().ok())
        .map(|zone| SourceProjection::Utm { zone })
        .unwrap_or(SourceProjection::Unknown);

    let tile_re = Regex::new(r"x_x_x_([0-9_]+?)F").expect("static regex");
    let tile_id = tile_re
        .captures(native_id)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| native_id.to_string());

    (projection, tile_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATIVE_ID: &str =
        "SWOT_L2_HR_Raster_100m_UTM45V_N_x_x_x_009_023_131F_20240310T113044_20240310T113105_PIC0_01";

    #[test]
    fn test_parse_native_id() {
        let (projection, tile_id) = parse_native_id(NATIVE_ID);
        assert_eq!(projection, SourceProjection::Utm { zone: 45 });
        assert_eq!(tile_id, "009_023_131");
    }

    #[test]
    fn test_parse_native_id_without_zone() {
        let (projection, tile_id) = parse_native_id("SWOT_L2_HR_Raster_100m_misc_product");
        assert_eq!(projection, SourceProjection::Unknown);
        assert_eq!(tile_id, "SWOT_L2_HR_Raster_100m_misc_product");
    }

    #[test]
    fn test_parse_utc_date_variants() {
        assert_eq!(
            parse_utc_date("2024-03-10T12:00:21.000Z"),
            NaiveDate::from_ymd_opt(2024, 3, 10)
        );
        assert_eq!(
            parse_utc_date("2024-03-10T12:00:21Z"),
            NaiveDate::from_ymd_opt(2024, 3, 10)
        );
        assert_eq!(parse_utc_date("not-a-date"), None);
    }

    fn item(native_id: &str, ending: &str, urls: &[(&str, &str)]) -> UmmItem {
        UmmItem {
            meta: UmmMeta {
                native_id: native_id.to_string(),
            },
            umm: UmmRecord {
                temporal_extent: TemporalExtent {
                    range_date_time: RangeDateTime {
                        ending_date_time: ending.to_string(),
                    },
                },
                related_urls: urls
                    .iter()
                    .map(|(url, ty)| RelatedUrl {
                        url: url.to_string(),
                        url_type: ty.to_string(),
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn test_decode_umm_json() {
        let body = format!(
            r#"{{
                "hits": 1,
                "items": [{{
                    "meta": {{ "native-id": "{}", "concept-id": "G1-POCLOUD" }},
                    "umm": {{
                        "TemporalExtent": {{
                            "RangeDateTime": {{
                                "BeginningDateTime": "2024-03-10T11:30:44.000Z",
                                "EndingDateTime": "2024-03-10T11:31:05.000Z"
                            }}
                        }},
                        "RelatedUrls": [
                            {{ "URL": "https://example.com/SWOT_L2_HR_Raster_100m_a.nc", "Type": "GET DATA" }}
                        ]
                    }}
                }}]
            }}"#,
            NATIVE_ID
        );

        let decoded: UmmSearchResponse = serde_json::from_str(&body).unwrap();
        let granules = collect_granules(decoded, "SWOT_L2_HR_Raster_100m");
        assert_eq!(granules.len(), 1);
        assert_eq!(granules[0].native_id, NATIVE_ID);
        assert_eq!(
            granules[0].acquisition_date,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );
    }

    #[test]
    fn test_collect_granules_filters_and_dedups() {
        let body = UmmSearchResponse {
            items: vec![
                item(
                    NATIVE_ID,
                    "2024-03-10T12:00:21.000Z",
                    &[
                        ("https://example.com/browse.png", "GET RELATED VISUALIZATION"),
                        ("https://example.com/SWOT_L2_HR_Raster_100m_a.nc", "GET DATA"),
                    ],
                ),
                // Same date: deduplicated
                item(
                    "SWOT_L2_HR_Raster_100m_UTM45V_N_x_x_x_009_023_132F_b_PIC0_01",
                    "2024-03-10T18:00:00.000Z",
                    &[("https://example.com/SWOT_L2_HR_Raster_100m_b.nc", "GET DATA")],
                ),
                // No matching data URL: discarded
                item(
                    "SWOT_L2_HR_Raster_250m_UTM44V_N_x_x_x_010_100_050F_c_PIC0_01",
                    "2024-03-11T01:00:00.000Z",
                    &[("https://example.com/SWOT_L2_HR_Raster_250m_c.nc", "GET DATA")],
                ),
                item(
                    "SWOT_L2_HR_Raster_100m_UTM44V_N_x_x_x_010_100_051F_d_PIC0_01",
                    "2024-03-12T01:00:00.000Z",
                    &[("https://example.com/SWOT_L2_HR_Raster_100m_d.nc", "GET DATA")],
                ),
            ],
        };

        let granules = collect_granules(body, "SWOT_L2_HR_Raster_100m");
        assert_eq!(granules.len(), 2);
        assert_eq!(
            granules[0].acquisition_date,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );
        assert_eq!(granules[0].tile_id, "009_023_131");
        assert_eq!(granules[0].data_urls.len(), 1);
        assert_eq!(
            granules[1].source_projection,
            SourceProjection::Utm { zone: 44 }
        );
    }
}
