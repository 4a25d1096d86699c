use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::fetch::{HttpClient, fetch_json};
use crate::model::{SeatClass, Stop};
use crate::services::{InvalidStops, SeatInventory, StopTopology};

#[derive(Deserialize)]
struct CommonResp<T> {
    success: bool,
    message: Option<String>,
    content: Option<T>,
}

impl<T> CommonResp<T> {
    fn into_content(self, what: &str) -> Result<T> {
        if !self.success {
            return Err(anyhow!(
                "back office refused {what}: {}",
                self.message.unwrap_or_default()
            ));
        }
        self.content
            .ok_or_else(|| anyhow!("back office returned no content for {what}"))
    }
}

/// A train station row as the admin API returns it.
///
/// `km` is the distance from the *previous* station; the first station's
/// value is ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrainStation {
    train_code: String,
    index: u32,
    name: String,
    name_pinyin: String,
    in_time: NaiveTime,
    out_time: NaiveTime,
    km: Decimal,
}

/// Shifts per-station "distance from previous" into per-stop "distance to next".
fn into_stops(mut stations: Vec<TrainStation>) -> Result<Vec<Stop>> {
    stations.sort_by_key(|station| station.index);
    if let Some(station) = stations.iter().skip(1).find(|s| s.km < Decimal::ZERO) {
        return Err(InvalidStops(format!(
            "station {} of {} has negative distance {}",
            station.index, station.train_code, station.km
        ))
        .into());
    }

    let next_km: Vec<Decimal> = stations
        .iter()
        .skip(1)
        .map(|s| s.km)
        .chain(std::iter::once(Decimal::ZERO))
        .collect();

    Ok(stations
        .into_iter()
        .zip(next_km)
        .map(|(station, distance_to_next_km)| Stop {
            train_code: station.train_code,
            index: station.index,
            name: station.name,
            name_pinyin: station.name_pinyin,
            arrival: station.in_time,
            departure: station.out_time,
            distance_to_next_km,
        })
        .collect())
}

pub struct BackofficeClient {
    base_url: String,
    client: Arc<dyn HttpClient>,
}

impl BackofficeClient {
    pub fn new(base_url: &str, client: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{path}", self.base_url))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }
}

#[async_trait]
impl StopTopology for BackofficeClient {
    #[tracing::instrument(skip(self))]
    async fn list_stops(&self, train_code: &str) -> Result<Vec<Stop>> {
        let url = self.url(
            "admin/train-station/query-by-train",
            &[("trainCode", train_code)],
        )?;
        let resp: CommonResp<Vec<TrainStation>> =
            fetch_json(self.client.as_ref(), url.as_str()).await?;
        let stations = resp.into_content("station list")?;
        debug!(count = stations.len(), "Stations received");
        into_stops(stations)
    }
}

#[async_trait]
impl SeatInventory for BackofficeClient {
    #[tracing::instrument(skip(self, date), fields(date = %date))]
    async fn count_available(
        &self,
        date: NaiveDate,
        train_code: &str,
        class: SeatClass,
    ) -> Result<u32> {
        let date = date.format("%Y-%m-%d").to_string();
        let url = self.url(
            "admin/daily-train-seat/count",
            &[
                ("date", date.as_str()),
                ("trainCode", train_code),
                ("seatType", class.code()),
            ],
        )?;
        let resp: CommonResp<i64> = fetch_json(self.client.as_ref(), url.as_str()).await?;
        // The count endpoint answers -1 when the train has no seat of this class.
        let count = resp.into_content("seat count")?.max(0);
        Ok(u32::try_from(count)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use std::time::Duration;

    fn station(index: u32, km: &str) -> TrainStation {
        TrainStation {
            train_code: "D3".to_string(),
            index,
            name: format!("S{index}"),
            name_pinyin: format!("s{index}"),
            in_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            out_time: NaiveTime::from_hms_opt(8, 2, 0).unwrap(),
            km: km.parse().unwrap(),
        }
    }

    #[test]
    fn test_distances_shift_to_next_stop() {
        let stops = into_stops(vec![station(2, "200"), station(0, "0"), station(1, "100")]).unwrap();
        let distances: Vec<_> = stops.iter().map(|s| s.distance_to_next_km).collect();
        assert_eq!(
            distances,
            vec![Decimal::from(100), Decimal::from(200), Decimal::ZERO]
        );
    }

    #[test]
    fn test_negative_station_distance_is_rejected() {
        let err = into_stops(vec![station(0, "0"), station(1, "-5")]).unwrap_err();
        assert!(err.is::<InvalidStops>());
    }

    #[test]
    fn test_envelope_failure_carries_message() {
        let resp: CommonResp<i64> =
            serde_json::from_str(r#"{"success": false, "message": "token expired"}"#).unwrap();
        let err = resp.into_content("seat count").unwrap_err();
        assert!(err.to_string().contains("token expired"));
    }

    #[test]
    fn test_station_json_decoding() {
        let json = r#"{"success": true, "content": [
            {"trainCode": "D3", "index": 0, "name": "上海", "namePinyin": "shanghai",
             "inTime": "07:00:00", "outTime": "07:00:00", "km": 0},
            {"trainCode": "D3", "index": 1, "name": "杭州东", "namePinyin": "hangzhoudong",
             "inTime": "07:45:00", "outTime": "07:48:00", "km": 159.5}
        ]}"#;
        let resp: CommonResp<Vec<TrainStation>> = serde_json::from_str(json).unwrap();
        let stops = into_stops(resp.into_content("station list").unwrap()).unwrap();
        assert_eq!(stops[0].distance_to_next_km, Decimal::new(1595, 1));
        assert_eq!(stops[1].name, "杭州东");
    }

    #[test]
    fn test_url_encodes_query() {
        let client = BackofficeClient::new(
            "http://localhost:8000/business/",
            Arc::new(BasicClient::new(Duration::from_secs(5)).unwrap()),
        );
        let url = client
            .url("admin/daily-train-seat/count", &[("trainCode", "G 1")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/business/admin/daily-train-seat/count?trainCode=G+1"
        );
    }
}
