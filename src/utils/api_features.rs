// ============================================================================
// API FEATURES - FILTRE / TRI / PROJECTION / PAGINATION
// ============================================================================
//
// Transforme la query string d'une requête en requête SeaORM.
// Les étapes s'enchaînent toujours dans le même ordre:
//
//   ApiFeatures::new(Entity::find(), &query)
//       .filter()?        -> ?price[gte]=500&difficulty=easy
//       .sort()?          -> ?sort=-price,ratings_average  (+ created_at DESC)
//       .limit_fields()?  -> ?fields=name,price
//       .paginate()       -> ?page=2&limit=10
//       .fetch(db)
//
// Points d'attention:
//   - Les clés réservées (page, sort, limit, fields) ne filtrent jamais
//   - Un champ inconnu ou caché (ex: password) est refusé (400)
//   - Une valeur non convertible au type de la colonne -> Cast (400)
//   - Une page explicite au-delà des résultats -> PageOutOfRange (404)
//
// ============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ColumnType, Condition, ConnectionTrait, EntityTrait, IdenStatic, Iterable, Order,
    PrimaryKeyToColumn, QueryFilter, QueryOrder, QuerySelect, Select, Value,
};
use serde_json::Value as JsonValue;

use crate::error::AppError;

pub type QueryMap = HashMap<String, String>;

const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];
pub const DEFAULT_LIMIT: u64 = 50;
/// Plafond de `limit` : au-delà, la valeur est ramenée à ce maximum
pub const MAX_LIMIT: u64 = 1000;
/// Les drivers SQL lient LIMIT/OFFSET en i64
const MAX_OFFSET: u64 = i64::MAX as u64;

/// Entité interrogeable via l'API
pub trait ApiResource: EntityTrait {
    /// Colonne de date de création : tri par défaut et départage
    fn created_at() -> Self::Column;

    /// Colonnes jamais exposées au client (ni filtre, ni tri, ni projection)
    fn is_hidden(_column: &Self::Column) -> bool {
        false
    }

    /// Colonnes ajoutées à toute projection, en plus de la clé primaire
    fn always_selected() -> Vec<Self::Column> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
}

pub struct ApiFeatures<'q, E: ApiResource> {
    query: Select<E>,
    query_string: &'q QueryMap,
    condition: Condition,
    orders: Vec<(E::Column, Order)>,
    fields: Option<Vec<E::Column>>,
    explicit_page: bool,
    offset: u64,
    limit: u64,
}

impl<'q, E: ApiResource> ApiFeatures<'q, E> {
    pub fn new(query: Select<E>, query_string: &'q QueryMap) -> Self {
        Self {
            query,
            query_string,
            condition: Condition::all(),
            orders: Vec::new(),
            fields: None,
            explicit_page: false,
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }

    /// 1. Filtrage : égalité, ou comparaison via field[gte|gt|lte|lt]
    pub fn filter(mut self) -> Result<Self, AppError> {
        let query_string = self.query_string;
        for (key, raw) in query_string {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }

            let (name, operator) = parse_filter_key(key)?;
            let column = column_by_name::<E>(name)?;
            let value = cast_value(column, name, raw)?;

            let expr = match operator {
                Operator::Eq => column.eq(value),
                Operator::Gte => column.gte(value),
                Operator::Gt => column.gt(value),
                Operator::Lte => column.lte(value),
                Operator::Lt => column.lt(value),
            };
            self.condition = self.condition.add(expr);
        }

        Ok(self)
    }

    /// 2. Tri : "-price,name" puis created_at DESC (défaut et départage)
    pub fn sort(mut self) -> Result<Self, AppError> {
        let query_string = self.query_string;
        if let Some(sort) = query_string.get("sort") {
            for part in sort.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let (name, order) = match part.strip_prefix('-') {
                    Some(name) => (name, Order::Desc),
                    None => (part, Order::Asc),
                };
                self.orders.push((column_by_name::<E>(name)?, order));
            }
        }

        self.orders.push((E::created_at(), Order::Desc));
        // Dernier départage : documents créés dans la même milliseconde
        for pk in E::PrimaryKey::iter() {
            self.orders.push((pk.into_column(), Order::Desc));
        }

        Ok(self)
    }

    /// 3. Projection : "name,price". La clé primaire (et `always_selected`)
    /// est toujours incluse.
    pub fn limit_fields(mut self) -> Result<Self, AppError> {
        let query_string = self.query_string;
        if let Some(fields) = query_string.get("fields") {
            let mut columns: Vec<E::Column> =
                E::PrimaryKey::iter().map(|pk| pk.into_column()).collect();
            for column in E::always_selected() {
                if !columns.iter().any(|c| c.as_str() == column.as_str()) {
                    columns.push(column);
                }
            }

            for name in fields.split(',').map(str::trim).filter(|f| !f.is_empty()) {
                let column = column_by_name::<E>(name)?;
                if !columns.iter().any(|c| c.as_str() == column.as_str()) {
                    columns.push(column);
                }
            }
            self.fields = Some(columns);
        }

        Ok(self)
    }

    /// 4. Pagination : page (défaut 1), limit (défaut 50, au plus MAX_LIMIT)
    pub fn paginate(mut self) -> Self {
        let page = parse_positive(self.query_string.get("page"));
        let limit = parse_positive(self.query_string.get("limit"))
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);

        self.explicit_page = page.is_some();
        self.limit = limit;
        self.offset = (page.unwrap_or(1) - 1).saturating_mul(limit).min(MAX_OFFSET);
        self
    }

    /// Exécute la requête et retourne les documents projetés en JSON
    pub async fn fetch<C: ConnectionTrait>(self, db: &C) -> Result<Vec<JsonValue>, AppError> {
        let filtered = self.query.filter(self.condition);

        if self.explicit_page && self.offset > 0 {
            let total = count(filtered.clone(), db).await?;
            if self.offset >= total {
                return Err(AppError::PageOutOfRange);
            }
        }

        let columns = self.fields.unwrap_or_else(|| visible_columns::<E>());

        let mut query = filtered;
        for (column, order) in self.orders {
            query = query.order_by(column, order);
        }

        Ok(query
            .select_only()
            .columns(columns)
            .offset(self.offset)
            .limit(self.limit)
            .into_json()
            .all(db)
            .await?)
    }
}

async fn count<E: EntityTrait, C: ConnectionTrait>(query: Select<E>, db: &C) -> Result<u64, AppError> {
    let total: Option<i64> = query
        .select_only()
        .column_as(Expr::cust("COUNT(*)"), "count")
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.and_then(|t| u64::try_from(t).ok()).unwrap_or(0))
}

fn visible_columns<E: ApiResource>() -> Vec<E::Column> {
    E::Column::iter().filter(|c| !E::is_hidden(c)).collect()
}

fn column_by_name<E: ApiResource>(name: &str) -> Result<E::Column, AppError> {
    E::Column::iter()
        .find(|c| c.as_str() == name && !E::is_hidden(c))
        .ok_or_else(|| AppError::BadRequest(format!("Invalid query field: {name}")))
}

/// "price[gte]" -> ("price", Gte), "price" -> ("price", Eq)
fn parse_filter_key(key: &str) -> Result<(&str, Operator), AppError> {
    let Some((name, rest)) = key.split_once('[') else {
        return Ok((key, Operator::Eq));
    };

    let operator = match rest.strip_suffix(']') {
        Some("gte") => Operator::Gte,
        Some("gt") => Operator::Gt,
        Some("lte") => Operator::Lte,
        Some("lt") => Operator::Lt,
        _ => return Err(AppError::BadRequest(format!("Invalid filter operator in '{key}'"))),
    };
    Ok((name, operator))
}

/// Convertit la valeur brute de la query string au type de la colonne
fn cast_value<C: ColumnTrait>(column: C, name: &str, raw: &str) -> Result<Value, AppError> {
    let cast_error = || AppError::Cast {
        path: name.to_string(),
        value: raw.to_string(),
    };

    let value = match column.def().get_column_type() {
        ColumnType::Integer | ColumnType::SmallInteger | ColumnType::TinyInteger => {
            Value::from(raw.parse::<i32>().map_err(|_| cast_error())?)
        }
        ColumnType::BigInteger => Value::from(raw.parse::<i64>().map_err(|_| cast_error())?),
        ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) => {
            Value::from(raw.parse::<f64>().map_err(|_| cast_error())?)
        }
        ColumnType::Boolean => Value::from(raw.parse::<bool>().map_err(|_| cast_error())?),
        ColumnType::String(_) | ColumnType::Char(_) | ColumnType::Text => Value::from(raw.to_string()),
        ColumnType::TimestampWithTimeZone | ColumnType::DateTime | ColumnType::Timestamp => {
            let date: DateTime<Utc> = raw.parse().map_err(|_| cast_error())?;
            Value::from(date)
        }
        _ => {
            return Err(AppError::BadRequest(format!(
                "Filtering on field '{name}' is not supported"
            )));
        }
    };

    Ok(value)
}

/// Entier > 0, sinon None (même comportement que `x * 1 || défaut`)
fn parse_positive(raw: Option<&String>) -> Option<u64> {
    raw.and_then(|v| v.trim().parse::<u64>().ok()).filter(|v| *v > 0)
}
