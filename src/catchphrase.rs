use rand::Rng;
use rand::seq::IndexedRandom;

/// Theme a set of content keywords maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhraseCategory {
    Leadership,
    BehavioralModeling,
    Growth,
    Inspiration,
    Business,
    Generic,
}

impl PhraseCategory {
    /// Categories with keywords, in match priority order.
    const MATCHED: [PhraseCategory; 5] = [
        PhraseCategory::Leadership,
        PhraseCategory::BehavioralModeling,
        PhraseCategory::Growth,
        PhraseCategory::Inspiration,
        PhraseCategory::Business,
    ];

    /// Lowercase substrings that select this category.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            PhraseCategory::Leadership => &["lideran", "líder", "lider", "leader"],
            PhraseCategory::BehavioralModeling => {
                &["comportament", "modelagem", "behavior", "hábito", "habito"]
            }
            PhraseCategory::Growth => &["cresciment", "desenvolviment", "growth", "evolu", "aprend"],
            PhraseCategory::Inspiration => &["inspira", "motiva", "sonho", "propósito"],
            PhraseCategory::Business => &[
                "negócio",
                "negocio",
                "empresa",
                "business",
                "vendas",
                "mercado",
                "estratégia",
            ],
            PhraseCategory::Generic => &[],
        }
    }

    /// Short phrases (at most four words) for this category.
    pub fn phrases(self) -> &'static [&'static str] {
        match self {
            PhraseCategory::Leadership => &[
                "Lidere pelo exemplo",
                "Liderança é serviço",
                "Inspire sua equipe",
                "Lidere com propósito",
                "Seja a referência",
            ],
            PhraseCategory::BehavioralModeling => &[
                "Hábitos moldam resultados",
                "Mude o padrão",
                "Comportamento é escolha",
                "Modele a excelência",
            ],
            PhraseCategory::Growth => &[
                "Cresça todos os dias",
                "Evolua sempre",
                "Um passo por vez",
                "Aprender é crescer",
            ],
            PhraseCategory::Inspiration => &[
                "Acredite no processo",
                "Faça acontecer",
                "Seu momento é agora",
                "Sonhe grande",
            ],
            PhraseCategory::Business => &[
                "Resultados falam alto",
                "Estratégia vence",
                "Foco no cliente",
                "Pense como dono",
            ],
            PhraseCategory::Generic => &[
                "Pense nisso",
                "Reflita hoje",
                "Vale a reflexão",
                "Compartilhe essa ideia",
            ],
        }
    }
}

/// Picks a themed short phrase when no overlay text was supplied.
#[derive(Clone, Copy, Debug, Default)]
pub struct CatchphraseSelector;

impl CatchphraseSelector {
    /// First category whose keyword occurs in `content` (case-insensitive), else
    /// [`PhraseCategory::Generic`].
    pub fn categorize(&self, content: &str) -> PhraseCategory {
        let lowered = content.to_lowercase();
        if lowered.trim().is_empty() {
            return PhraseCategory::Generic;
        }
        PhraseCategory::MATCHED
            .into_iter()
            .find(|cat| cat.keywords().iter().any(|k| lowered.contains(k)))
            .unwrap_or(PhraseCategory::Generic)
    }

    /// Categorize `content` and draw one phrase from that category with `rng`.
    pub fn select<R: Rng + ?Sized>(&self, content: &str, rng: &mut R) -> (PhraseCategory, String) {
        let category = self.categorize(content);
        let phrase = category
            .phrases()
            .choose(rng)
            .copied()
            .unwrap_or("Pense nisso");
        tracing::debug!(?category, phrase, "catchphrase selected");
        (category, phrase.to_string())
    }
}
