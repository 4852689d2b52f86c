use crate::brief::BriefGenerator;
use crate::error::BriefError;
use crate::models::{DesignBrief, ImageUpload};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// Deterministic stand-in for the live service. Picks one of three canned briefs
/// by keyword in the notes or the image filename; never fails.
#[derive(Debug, Clone, Default)]
pub struct MockBriefGenerator {
    delay: Duration,
}

impl MockBriefGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated service latency before the brief is returned.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn select(filename: &str, notes: &str) -> DesignBrief {
        let haystacks = [notes.to_lowercase(), filename.to_lowercase()];
        if mentions(&haystacks, &["bohemian", "boho"]) {
            bohemian_chic()
        } else if mentions(&haystacks, &["suit"]) {
            classic_elegance()
        } else {
            modern_minimalist()
        }
    }
}

#[async_trait]
impl BriefGenerator for MockBriefGenerator {
    async fn generate(&self, image: &ImageUpload, notes: &str) -> Result<DesignBrief, BriefError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let brief = Self::select(&image.filename, notes);
        info!("📦 Mock design brief selected: {}", brief.style);
        Ok(brief)
    }
}

fn mentions(haystacks: &[String], tokens: &[&str]) -> bool {
    haystacks.iter().any(|h| tokens.iter().any(|t| h.contains(t)))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn modern_minimalist() -> DesignBrief {
    DesignBrief {
        style: "Modern Minimalist".into(),
        garment_type: "A-line Dress".into(),
        key_features: strings(&["Clean lines", "Asymmetrical hem", "Subtle pleating"]),
        suggested_fabrics: strings(&["Silk crepe", "Organic cotton", "Tencel"]),
        occasion: "Cocktail party".into(),
        summary: "A sophisticated yet understated dress that combines modern minimalism with elegant details. Perfect for evening events where you want to make a subtle statement.".into(),
    }
}

fn bohemian_chic() -> DesignBrief {
    DesignBrief {
        style: "Bohemian Chic".into(),
        garment_type: "Maxi Dress".into(),
        key_features: strings(&["Flowing silhouette", "Embroidered details", "Bell sleeves"]),
        suggested_fabrics: strings(&["Rayon", "Linen blend", "Cotton voile"]),
        occasion: "Summer festival".into(),
        summary: "A free-spirited maxi dress that captures the essence of bohemian style with intricate embroidery and a flowing silhouette that moves with you.".into(),
    }
}

fn classic_elegance() -> DesignBrief {
    DesignBrief {
        style: "Classic Elegance".into(),
        garment_type: "Tailored Suit".into(),
        key_features: strings(&["Structured shoulders", "Double-breasted", "Tapered trousers"]),
        suggested_fabrics: strings(&["Wool blend", "Silk lining", "Hemp fabric"]),
        occasion: "Business meeting".into(),
        summary: "A timeless tailored suit that exudes confidence and professionalism. The structured silhouette creates a powerful presence while maintaining comfort.".into(),
    }
}
