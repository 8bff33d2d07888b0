//! Request bodies sent to the portal backend
//!
//! Field casing follows the backend models: company listings and
//! internships use PascalCase keys, posts and comments use snake_case.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompanyListing {
    /// Required
    pub company: String,
    pub occupation: String,
    /// Required
    pub member: i64,
    pub selection: String,
    pub intern: bool,
}

impl CompanyListing {
    pub fn for_run(unique_id: &str) -> Self {
        Self {
            company: format!("Test Company {}", unique_id),
            occupation: "Software Engineer".to_string(),
            member: 100,
            selection: "1st Interview".to_string(),
            intern: true,
        }
    }
}

/// Partial update of a company listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompanyListingUpdate {
    pub company: String,
}

impl CompanyListingUpdate {
    pub fn for_run(unique_id: &str) -> Self {
        Self {
            company: format!("Updated Company {}", unique_id),
        }
    }
}

/// Internship entry. The backend model has no required fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Internship {
    pub title: String,
    pub company: String,
    pub dailystart: i64,
    pub dailyfinish: i64,
    pub content: String,
    pub selection: String,
    pub joined: bool,
}

impl Internship {
    pub fn for_run(unique_id: &str) -> Self {
        Self {
            title: format!("Awesome Internship {}", unique_id),
            company: "Intern Inc.".to_string(),
            dailystart: 9,
            dailyfinish: 18,
            content: "Develop a new feature.".to_string(),
            selection: "Pending".to_string(),
            joined: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub title: String,
    pub content: String,
    pub display_name: String,
}

impl Post {
    pub fn for_run(unique_id: &str, vu: u64) -> Self {
        Self {
            title: format!("Test Post {}", unique_id),
            content: "This is the content of the test post.".to_string(),
            display_name: display_name(vu),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub content: String,
    pub display_name: String,
}

impl Comment {
    pub fn for_run(vu: u64) -> Self {
        Self {
            content: "This is a great comment!".to_string(),
            display_name: display_name(vu),
        }
    }
}

fn display_name(vu: u64) -> String {
    format!("User{}", vu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_company_listing_wire_format() {
        let value = serde_json::to_value(CompanyListing::for_run("3-7")).unwrap();
        assert_eq!(
            value,
            json!({
                "Company": "Test Company 3-7",
                "Occupation": "Software Engineer",
                "Member": 100,
                "Selection": "1st Interview",
                "Intern": true,
            })
        );

        let update = serde_json::to_value(CompanyListingUpdate::for_run("3-7")).unwrap();
        assert_eq!(update, json!({"Company": "Updated Company 3-7"}));
    }

    #[test]
    fn test_internship_wire_format() {
        let value = serde_json::to_value(Internship::for_run("3-7")).unwrap();
        assert_eq!(value["Title"], "Awesome Internship 3-7");
        assert_eq!(value["Dailystart"], 9);
        assert_eq!(value["Dailyfinish"], 18);
        assert_eq!(value["Joined"], false);
        assert_eq!(value.as_object().unwrap().len(), 7);
    }

    #[test]
    fn test_post_and_comment_wire_format() {
        let post = serde_json::to_value(Post::for_run("3-7", 3)).unwrap();
        assert_eq!(
            post,
            json!({
                "title": "Test Post 3-7",
                "content": "This is the content of the test post.",
                "display_name": "User3",
            })
        );

        let comment = serde_json::to_value(Comment::for_run(3)).unwrap();
        assert_eq!(comment["display_name"], "User3");
        assert_eq!(comment["content"], "This is a great comment!");
    }
}
