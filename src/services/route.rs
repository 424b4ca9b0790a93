//! Path routing.
//!
//! Maps the segment layout of the HTTP contract onto the five service
//! operations:
//!
//! | Path | Request |
//! |------|---------|
//! | `/{type}` | [`ActivityRequest::ListByType`] |
//! | `/{type}/{id}` | [`ActivityRequest::GetById`] |
//! | `/{type}/{id}/activities` | [`ActivityRequest::AllActivities`] |
//! | `/{type}/{id}/{verb}` | [`ActivityRequest::Relationships`] |
//! | `/{type}/{id}/{verb}/{objectType}` | [`ActivityRequest::ByTargetType`] |
//!
//! The literal `activities` segment takes precedence over a verb of the same
//! name. Segments are not validated here; the query builders do that.

use crate::models::{Activity, ActivityGroup, ActorRelationships, Node};
use crate::query::{Query, builder};
use crate::{Error, Result};
use serde::Serialize;

/// Reserved third segment selecting the grouped activity listing.
pub const ACTIVITIES_SEGMENT: &str = "activities";

/// One of the five read operations, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityRequest {
    /// All nodes of a label.
    ListByType {
        /// Node label.
        label: String,
    },
    /// One node by external id.
    GetById {
        /// Node label.
        label: String,
        /// External id.
        id: String,
    },
    /// Edges of one verb from an actor, aggregated.
    Relationships {
        /// Actor label.
        label: String,
        /// Actor external id.
        id: String,
        /// Verb.
        verb: String,
    },
    /// Edges of one verb from an actor to objects of one label.
    ByTargetType {
        /// Actor label.
        label: String,
        /// Actor external id.
        id: String,
        /// Verb.
        verb: String,
        /// Object label.
        object_label: String,
    },
    /// Every outgoing edge of an actor, grouped by verb.
    AllActivities {
        /// Actor label.
        label: String,
        /// Actor external id.
        id: String,
    },
}

impl ActivityRequest {
    /// Parses a request path such as `/user/1/FAVORITED`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for an empty segment or an
    /// unsupported number of segments.
    pub fn from_path(path: &str) -> Result<Self> {
        let trimmed = path.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(Error::InvalidParameter("path must not be empty".to_string()));
        }
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidParameter(format!(
                "path contains an empty segment: {path}"
            )));
        }

        let owned = |i: usize| segments[i].to_string();
        match segments.len() {
            1 => Ok(Self::ListByType { label: owned(0) }),
            2 => Ok(Self::GetById {
                label: owned(0),
                id: owned(1),
            }),
            3 if segments[2] == ACTIVITIES_SEGMENT => Ok(Self::AllActivities {
                label: owned(0),
                id: owned(1),
            }),
            3 => Ok(Self::Relationships {
                label: owned(0),
                id: owned(1),
                verb: owned(2),
            }),
            4 => Ok(Self::ByTargetType {
                label: owned(0),
                id: owned(1),
                verb: owned(2),
                object_label: owned(3),
            }),
            n => Err(Error::InvalidParameter(format!(
                "unsupported path with {n} segments"
            ))),
        }
    }

    /// Operation name used in logs and metrics.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::ListByType { .. } => "list_by_type",
            Self::GetById { .. } => "get_by_id",
            Self::Relationships { .. } => "list_relationships",
            Self::ByTargetType { .. } => "filter_by_relationship_and_target_type",
            Self::AllActivities { .. } => "list_all_activities_by_actor",
        }
    }

    /// Builds the query for this request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if a segment fails validation.
    pub fn build(&self) -> Result<Query> {
        match self {
            Self::ListByType { label } => builder::list_by_type(label),
            Self::GetById { label, id } => builder::get_by_id(label, id),
            Self::Relationships { label, id, verb } => {
                builder::list_relationships(label, id, verb)
            },
            Self::ByTargetType {
                label,
                id,
                verb,
                object_label,
            } => builder::filter_by_relationship_and_target_type(label, id, verb, object_label),
            Self::AllActivities { label, id } => builder::list_all_activities_by_actor(label, id),
        }
    }
}

/// Result of a routed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActivityResponse {
    /// Nodes from `ListByType` or `GetById`.
    Nodes(Vec<Node>),
    /// Aggregates from `Relationships`.
    Relationships(Vec<ActorRelationships>),
    /// Triples from `ByTargetType`.
    Activities(Vec<Activity>),
    /// Groups from `AllActivities`.
    Groups(Vec<ActivityGroup>),
}

impl ActivityResponse {
    /// Number of top-level results.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Nodes(v) => v.len(),
            Self::Relationships(v) => v.len(),
            Self::Activities(v) => v.len(),
            Self::Groups(v) => v.len(),
        }
    }

    /// Returns true when the operation matched nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("/user", "list_by_type" ; "one segment")]
    #[test_case("user/1", "get_by_id" ; "two segments without leading slash")]
    #[test_case("/user/1/FAVORITED", "list_relationships" ; "three segments")]
    #[test_case("/user/1/activities", "list_all_activities_by_actor" ; "activities segment")]
    #[test_case(
        "/user/1/FAVORITED/photo/",
        "filter_by_relationship_and_target_type" ;
        "four segments trailing slash"
    )]
    fn test_route(path: &str, operation: &str) {
        assert_eq!(ActivityRequest::from_path(path).unwrap().operation(), operation);
    }

    #[test_case("" ; "empty")]
    #[test_case("/" ; "root")]
    #[test_case("/user//1" ; "empty segment")]
    #[test_case("/a/b/c/d/e" ; "too many segments")]
    fn test_route_rejects(path: &str) {
        assert!(matches!(
            ActivityRequest::from_path(path),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_activities_segment_wins_over_verb() {
        let request = ActivityRequest::from_path("/user/1/activities").unwrap();
        assert_eq!(
            request,
            ActivityRequest::AllActivities {
                label: "user".to_string(),
                id: "1".to_string(),
            }
        );
    }

    #[test]
    fn test_build_validates_segments() {
        let request = ActivityRequest::from_path("/user) DETACH DELETE (n").unwrap();
        assert!(request.build().is_err());
    }

    #[test]
    fn test_empty_response() {
        assert!(ActivityResponse::Nodes(Vec::new()).is_empty());
    }
}
