use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 一条 VIP 授权记录（按 CRCON 返回的原样保存，不在本地修改）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VipRecord {
    /// 玩家ID，格式取决于平台
    #[serde(alias = "steam_id_64", alias = "playerId")]
    pub player_id: String,
    #[serde(default)]
    pub name: String,
    /// 过期时间，None 或 "None" 表示永久
    #[serde(default, alias = "vip_expiration")]
    pub expiration: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl VipRecord {
    pub fn new(player_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            name: name.into(),
            expiration: None,
            description: None,
        }
    }

    pub fn with_expiration(mut self, expiration: impl Into<String>) -> Self {
        self.expiration = Some(expiration.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// 游戏服务器状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub current_players: u32,
    pub max_players: u32,
    pub map: Option<String>,
}

/// CRCON 不同版本的 get_status 字段不完全一致
#[derive(Debug, Default, Deserialize)]
struct RawServerStatus {
    name: Option<String>,
    current_players: Option<u32>,
    max_players: Option<u32>,
    /// 旧版本返回 "40/100"
    nb_players: Option<String>,
    map: Option<Value>,
}

impl ServerStatus {
    /// 从已解开信封的响应中解析
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let raw: RawServerStatus = serde_json::from_value(value)?;

        let (mut current, mut max) = (raw.current_players, raw.max_players);
        if let Some(nb) = raw.nb_players.as_deref() {
            let mut parts = nb.split('/').map(|p| p.trim().parse::<u32>().ok());
            if current.is_none() {
                current = parts.next().flatten();
            } else {
                parts.next();
            }
            if max.is_none() {
                max = parts.next().flatten();
            }
        }

        let map = match raw.map {
            Some(Value::String(s)) => Some(s),
            Some(Value::Object(obj)) => obj
                .get("pretty_name")
                .or_else(|| obj.get("id"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        };

        Ok(Self {
            name: raw.name.unwrap_or_default(),
            current_players: current.unwrap_or(0),
            max_players: max.unwrap_or(0),
            map,
        })
    }

    /// 形如 "40/100" 的玩家人数
    pub fn players_display(&self) -> String {
        format!("{}/{}", self.current_players, self.max_players)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vip_record_aliases() {
        let records: Vec<VipRecord> = serde_json::from_value(json!([
            {"player_id": "76561198000000001", "name": "Alice", "expiration": null},
            {"steam_id_64": "11000001", "name": "Bob", "vip_expiration": "2030-01-01T00:00:00+00:00"},
            {"playerId": "990000000", "name": "Carol", "expiration": "None", "description": "捐赠"}
        ]))
        .unwrap();

        assert_eq!(records[0].player_id, "76561198000000001");
        assert_eq!(records[0].expiration, None);
        assert_eq!(records[1].player_id, "11000001");
        assert_eq!(records[1].expiration.as_deref(), Some("2030-01-01T00:00:00+00:00"));
        assert_eq!(records[2].description.as_deref(), Some("捐赠"));
    }

    #[test]
    fn test_server_status_formats() {
        let status = ServerStatus::from_value(json!({
            "name": "Test Server",
            "current_players": 42,
            "max_players": 100,
            "map": {"id": "stmereeglise_warfare", "pretty_name": "St. Mere Eglise"}
        }))
        .unwrap();
        assert_eq!(status.players_display(), "42/100");
        assert_eq!(status.map.as_deref(), Some("St. Mere Eglise"));

        let legacy = ServerStatus::from_value(json!({
            "name": "Legacy",
            "nb_players": "12/98",
            "map": "foy_warfare"
        }))
        .unwrap();
        assert_eq!(legacy.current_players, 12);
        assert_eq!(legacy.max_players, 98);
        assert_eq!(legacy.map.as_deref(), Some("foy_warfare"));
    }
}
