use serde::{Deserialize, Serialize};

pub const ANY_SPECIALTY: &str = "All Specialties";
pub const ANY_STYLE: &str = "Any Style";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Designer {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub bio: String,
    pub rating: f32,
    pub projects_completed: u32,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DesignerQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub min_rating: Option<f32>,
}

impl DesignerQuery {
    pub fn matches(&self, designer: &Designer) -> bool {
        let matches_search = match self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            None => true,
            Some(q) => {
                let q = q.to_lowercase();
                designer.name.to_lowercase().contains(&q)
                    || designer.specialty.to_lowercase().contains(&q)
                    || designer.tags.iter().any(|t| t.to_lowercase().contains(&q))
            }
        };
        let matches_specialty = match self.specialty.as_deref() {
            None | Some(ANY_SPECIALTY) | Some("") => true,
            Some(s) => designer.specialty == s,
        };
        let matches_style = match self.style.as_deref() {
            None | Some(ANY_STYLE) | Some("") => true,
            Some(s) => designer.tags.iter().any(|t| t == s),
        };
        let matches_rating = self.min_rating.map_or(true, |min| designer.rating >= min);

        matches_search && matches_specialty && matches_style && matches_rating
    }
}

fn designer(id: &str, name: &str, specialty: &str, bio: &str, rating: f32, projects: u32, tags: &[&str]) -> Designer {
    Designer {
        id: id.into(),
        name: name.into(),
        specialty: specialty.into(),
        bio: bio.into(),
        rating,
        projects_completed: projects,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn catalogue() -> Vec<Designer> {
    vec![
        designer("1", "Jane Doe", "Knitwear",
            "Crafting timeless knitwear with a focus on sustainable materials and modern silhouettes.",
            4.8, 12, &["Minimalist", "Sustainable"]),
        designer("2", "John Smith", "Streetwear",
            "Bold, graphic-driven streetwear that pushes the boundaries of urban fashion culture.",
            5.0, 25, &["Urban", "Graphic"]),
        designer("3", "Maria Garcia", "Bridal",
            "Elegant and romantic bridal gowns designed to make every bride feel exceptional.",
            5.0, 18, &["Elegant", "Romantic"]),
        designer("4", "Chen Wei", "Haute Couture",
            "Exquisite, one-of-a-kind creations that blend traditional craftsmanship with avant-garde design.",
            4.5, 31, &["Avant-Garde", "Luxury"]),
    ]
}

/// Designers matching `query`, in catalogue order.
pub fn search(catalogue: &[Designer], query: &DesignerQuery) -> Vec<Designer> {
    catalogue.iter().filter(|d| query.matches(d)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(query: DesignerQuery) -> Vec<String> {
        search(&catalogue(), &query).into_iter().map(|d| d.name).collect()
    }

    #[test]
    fn empty_query_returns_everyone_in_order() {
        assert_eq!(names(DesignerQuery::default()), vec!["Jane Doe", "John Smith", "Maria Garcia", "Chen Wei"]);
    }

    #[test]
    fn search_covers_name_specialty_and_tags() {
        assert_eq!(names(DesignerQuery { q: Some("maria".into()), ..Default::default() }), vec!["Maria Garcia"]);
        assert_eq!(names(DesignerQuery { q: Some("COUTURE".into()), ..Default::default() }), vec!["Chen Wei"]);
        assert_eq!(names(DesignerQuery { q: Some("sustain".into()), ..Default::default() }), vec!["Jane Doe"]);
    }

    #[test]
    fn specialty_and_style_use_exact_matches() {
        let query = DesignerQuery { specialty: Some("Bridal".into()), ..Default::default() };
        assert_eq!(names(query), vec!["Maria Garcia"]);
        let query = DesignerQuery { style: Some("Minimalist".into()), ..Default::default() };
        assert_eq!(names(query), vec!["Jane Doe"]);
        let query = DesignerQuery { specialty: Some(ANY_SPECIALTY.into()), style: Some(ANY_STYLE.into()), ..Default::default() };
        assert_eq!(names(query).len(), 4);
    }

    #[test]
    fn minimum_rating_filters() {
        let query = DesignerQuery { min_rating: Some(4.9), ..Default::default() };
        assert_eq!(names(query), vec!["John Smith", "Maria Garcia"]);
    }
}
