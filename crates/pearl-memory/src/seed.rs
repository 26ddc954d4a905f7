//! Curated rule sets a fresh memory starts from.
//!
//! Seeding is idempotent: ids already present are skipped, so re-running
//! after learning has modified confidences leaves those entries untouched.

use pearl_core::{Priority, Result};
use pearl_llm::EmbeddingProvider;
use serde::Serialize;
use tracing::info;

use crate::entry::{DEFAULT_CONFIDENCE, MemoryEntry, Metadata, rule_metadata};
use crate::store::VectorStore;

pub const TRIAGE_RULE_AUTHOR: &str = "Senior_Neurosurgeon_Protocol";
pub const VISION_RULE_AUTHOR: &str = "Expert_Curated_Dataset";

/// Spine triage rules, stored as `senior_rule_001..`.
pub const TRIAGE_RULES: &[&str] = &[
    "Red Flag: Bilateral Sciatica or Saddle Anesthesia -> Immediate MRI to rule out Cauda Equina.",
    "Red Flag: History of Cancer + New Back Pain -> Assume Metastasis. Urgent Contrast MRI.",
    "Red Flag: Severe Night Pain + Elevated CRP (even without Fever) -> Suspect Discitis/Epidural Abscess. Order MRI.",
    "Red Flag: Trauma in Elderly (>70) + Pain on turning in bed -> Suspect Compression Fracture even if X-ray normal.",
    "Red Flag: Painless Foot Drop (Power < 3/5) -> Surgical Emergency. Decompress ASAP for recovery chance.",
    "Safety Trap: Hyperreflexia (Brisk Knee Jerk) -> Sign of Upper Motor Neuron lesion. Mandatory WHOLE SPINE Screening (30% Double Crush).",
    "Safety Trap: 3/5 Positive Waddell’s Signs (Tenderness, Simulation, Distraction, Regional, Overreaction) -> Strong indicator of Non-Organic/Psychogenic pain.",
    "Safety Trap: Distraction Test Positive (SLR sitting vs lying mismatch) -> One of Waddell's signs; check for other 4 to confirm functional overlay.",
    "Diagnosis: Weakness in Big Toe Extension (EHL) -> Specific for L5 Nerve Root.",
    "Diagnosis: Weakness in Ankle Dorsiflexion -> Specific for L4 Nerve Root.",
    "Diagnosis: Inability to do Single-Leg Calf Raise -> Definitive test for S1 Weakness (Toe walking is just a screening).",
    "Diagnosis: Severe L4 Radiculopathy (Shin Pain) but Normal Central Canal -> Mandatory check for 'Far Lateral' Disc at L4-5 OR Central Disc at L3-4.",
    "Diagnosis: Positive Patrick’s (FABER) Test -> Leans towards Hip, but DOES NOT rule out Spine (Facet/Pars fracture can mimic).",
    "Diagnosis: Leg pain relieved INSTANTLY by standing still -> High suspicion of Vascular Claudication. Neurogenic usually requires sitting/flexion.",
    "Diagnosis: Patient prefers Standing over Sitting -> Reduces probability of Stenosis; points towards Discogenic pain.",
    "Diagnosis: Foot Drop with PRESERVED Inversion Strength -> Peroneal Nerve Palsy (at knee). Weak Inversion -> L5 Nerve Root.",
    "Diagnosis: Anterior Thigh/Groin Pain -> Suspect High Lumbar (L1-L3). Use Femoral Nerve Stretch Test (FNST) to confirm.",
    "Diagnosis: Heel pain worst with 'First Steps' in morning -> Plantar Fasciitis. Heel pain radiating from Glute -> S1 Radiculopathy.",
    "Diagnosis: Unilateral 'Band-like' Chest/Abdominal Pain -> Suspect Thoracic Disc Herniation (Diagnosis of exclusion after Cardiac/Visceral).",
    "Diagnosis: 100% relief with Oral Steroids -> Suggests Inflammatory/Discogenic cause (but not confirmatory).",
    "Diagnosis: Male <40 + Chronic Back Pain + Morning Stiffness >30min -> Suspect Ankylosing Spondylitis. Check HLA-B27.",
    "Imaging: Recurrent pain after Discectomy -> Order MRI WITH Contrast to differentiate Scar Tissue (Fibrosis) vs Recurrent Disc/Infection.",
    "Imaging: Suspect Spondylolisthesis/Instability -> Mandatory X-Ray Flexion/Extension views.",
    "Imaging: 'Polka-Dot' or 'Corduroy' sign on MRI -> Benign Hemangioma. Ill-defined margins/Hypointense T1 -> Suspect Metastasis.",
    "Imaging: Obliteration of Perineural Fat on MRI -> Best sign for Foraminal Stenosis (though not standalone diagnostic).",
    "Imaging: Modic Type 1 Changes (Edema) on MRI -> Correlates strongly with Active Pain source (vs Type 2 Fat).",
    "Imaging: Schizas Grade D Stenosis (No CSF visible) -> High likelihood of failure with conservative care; Surgery likely inevitable if symptomatic.",
    "Imaging: Pars Defect suspect but not seen on X-ray -> CT Lumbar Spine is mandatory (PET CT if impending).",
    "Imaging: Tarlov Cyst on MRI -> Usually incidental. Only treat if symptoms strictly correlate (2-5% cases).",
    "Imaging: Isolated Disc Height Loss on X-Ray -> Non-diagnostic for pain source (common in asymptomatic elderly).",
    "Reporting: If SLR is positive -> State 'Tension Sign Positive' suggesting uncontained disc.",
    "Reporting: If Aggravated by Cough/Sneeze -> State 'Valsalva Positive' suggesting active dural compression.",
    "Reporting: If pain > 6 weeks -> Label as 'Sub-acute', justifying MRI over X-ray.",
];

/// Radiology pearls for the vision path, stored as `gold_vision_rule_001..`.
pub const VISION_RULES: &[&str] = &[
    "WATCH-OUT: Conjoined nerve roots frequently exhibit an asymmetrical 'fat crescent' sign on axial images; do not misinterpret as disc fragments.",
    "VISUAL RULE: IF nerve roots are visualized in the ventral portion of the dural sac on axial T2 (positive nerve root sedimentation sign), THEN high specificity for severe stenosis.",
    "VISUAL RULE: IF L4-L5 far lateral disc herniation is identified, THEN inspect exiting L4 nerve root for compression (L5 traversing root usually unaffected).",
    "CRITICAL: Severe neural foraminal stenosis (Grade 3) must be diagnosed if ANY morphological change/collapse of the nerve root is present, regardless of remaining fat.",
    "WATCH-OUT: Redundant or tortuous nerve roots above a stenotic level indicate severe compression and are a critical surgical indicator.",
    "VISUAL RULE: IF anterior CSF space is obliterated and cauda equina roots are aggregated/inseparable, THEN grade as Grade 2 moderate central stenosis.",
    "WATCH-OUT: Perineural fat obliteration in all four directions (circumferential) without root collapse indicates Grade 2 foraminal stenosis.",
    "WATCH-OUT: In LSTV (Transitional Vertebra), the interspace immediately ABOVE the transition is 9x more likely to herniate or degenerate.",
    "VISUAL RULE: IF 'squaring' of the first presumed sacral segment is seen on sagittal views, THEN suspect a lumbarized S1 vertebral body.",
    "CRITICAL: Misidentifying LSTV levels is a major surgery risk. Always count down from C2 using a whole-spine scout if available.",
    "VISUAL RULE: IF the iliolumbar ligament (ILL) is visible, THEN its origin from the transverse process typically identifies the L5 level (95% accuracy).",
    "WATCH-OUT: Bertolotti Syndrome (L5 pseudoarticulation with sacrum) often shows subchondral edema at the contact area, indicating symptomatic mechanical overload.",
    "VISUAL RULE: IF L5 transverse process width > 19 mm, THEN categorize as Castellvi Type I LSTV.",
    "WATCH-OUT: Pars defects (spondylolysis) appear as a 'dark line' or gap in the bone between superior and inferior facets on sagittal images.",
    "WATCH-OUT: IF L5-S1 disc height is preserved but patient has L5 radiculopathy, check the Far Lateral zone for extraforaminal herniation.",
    "WATCH-OUT: Transitional S1 segments often have functional facet joints between S1-S2, whereas normal anatomy is fused.",
    "VISUAL RULE: IF a dermatome gap exists (e.g., L5 to S2), THEN suspect S1 lumbarization of the sacrum.",
    "VISUAL RULE: IF marrow edema is seen contralateral to a unilateral fused LSTV, THEN suspect mechanical facet arthrosis due to altered loading.",
    "VISUAL RULE: IF lesion has high signal on T1 AND T2 with coarse vertical trabeculae, THEN it is a benign Hemangioma.",
    "WATCH-OUT: Metastatic lesions typically cause COMPLETE replacement of high T1 marrow signal (diffuse hypointensity).",
    "VISUAL RULE: IF lesion shows 'polka-dot' appearance on axial view (coarse trabeculae), THEN it is a Hemangioma.",
    "WATCH-OUT: 'Lipid-poor' hemangiomas can mimic metastasis (low T1); look for thickened trabeculae to differentiate.",
    "VISUAL RULE: IF lesion shows restricted diffusion (low ADC values), THEN suspect Malignancy over Hemangioma.",
    "WATCH-OUT: Malignant fractures often show a CONVEX, expanded posterior vertebral border.",
    "VISUAL RULE: IF retropulsion of bone fragments is seen, THEN fracture is likely Benign/Traumatic (Burst fracture), not malignant.",
    "WATCH-OUT: Bone marrow necrosis appears as irregular geographic areas of low T1/T2 signal; early sign of malignancy.",
    "VISUAL RULE: IF lesion is T1-hyperintense but shows T2 shortening, THEN consider Melanoma metastasis.",
    "VISUAL RULE: IF signal voids (dark gas) are visible in disc on T1/T2, THEN report 'Vacuum Phenomenon' (sign of instability, rules out infection).",
    "WATCH-OUT: Modic Type 1 changes (low T1, high T2) represent acute inflammation and can mimic Diskitis.",
    "CRITICAL: IF fluid signal in disc space is accompanied by ENDPLATE DESTRUCTION, THEN suspect Diskitis/Osteomyelitis (not just Modic changes).",
    "WATCH-OUT: High-Intensity Zones (HIZ) in outer annulus on T2 indicate Annular Fissures (painful tears).",
    "VISUAL RULE: IF round defects in endplate are seen, THEN they are Schmorl's Nodes (nucleus pulposus invagination).",
    "WATCH-OUT: Posterior wedging of L5 body WITHOUT endplate depression usually indicates Congenital Hypoplasia, not fracture.",
    "WATCH-OUT: Ligamentum Flavum Hypertrophy > 4mm is a major contributor to central stenosis; measure on axial views.",
    "VISUAL RULE: IF a Synovial Cyst is seen near a facet joint, THEN high risk for focal lateral recess stenosis.",
    "VISUAL RULE: IF a 'Traction Spur' (Macnab spur) projects horizontally 1mm from disc border, THEN it indicates early instability.",
    "VISUAL RULE: A 'Claw Sign' on STIR/T2 in the endplate is a reliable sign for EXCLUDING active infection/diskitis.",
    "WATCH-OUT: Do not evaluate foramina on midline sagittal images alone; verify with axial/parasagittal to avoid missing lateral stenosis.",
    "VISUAL RULE: IF patient has Foot Drop, THEN carefully inspect L4-L5 level for L5 root compression.",
    "VISUAL RULE: To differentiate Recurrent Disc vs Scar: Scar enhances immediately with Gadolinium; Disc material does not.",
    "WATCH-OUT: T2 hypointense flow voids in spinal canal may indicate Dural Fistula or AVM.",
    "VISUAL RULE: IF 'Rim and Flame' sign is seen on post-contrast MRI, THEN suspect Intramedullary Spinal Cord Metastasis.",
    "WATCH-OUT: Adhesive Arachnoiditis presents as 'Clumping' of nerve roots (Type 1) or 'Empty Sac' appearance (Type 2).",
    "VISUAL RULE: IF complete opacification of thecal sac spans >1 level, THEN suspect severe Stage III Arachnoiditis.",
    "WATCH-OUT: Limbus Vertebra (bony fragment at corner) mimics fracture but has well-defined sclerotic margins.",
    "WATCH-OUT: Motion artifacts cause 'ghosting'; confirm by checking if findings repeat in phase-encoding direction.",
    "VISUAL RULE: Asymmetric signal loss in CSF on T2 can be a normal flow artifact.",
    "CLINICAL CORRELATION: Bilateral wasting of Extensor Digitorum Brevis (EDB) muscle is a strong sign of underlying L5 radiculopathy/stenosis.",
];

/// What a seeding run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub added: usize,
    pub skipped: usize,
}

/// Seed the triage rule collection.
pub async fn seed_triage_rules(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
) -> Result<SeedReport> {
    seed(store, embedder, "senior_rule", TRIAGE_RULES, || {
        let mut meta = rule_metadata(Priority::Standard, DEFAULT_CONFIDENCE, TRIAGE_RULE_AUTHOR);
        meta.insert("type".into(), "master_rule".into());
        meta.insert("usage_count".into(), 0i64.into());
        meta
    })
    .await
}

/// Seed the visual correction collection.
pub async fn seed_vision_rules(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
) -> Result<SeedReport> {
    seed(store, embedder, "gold_vision_rule", VISION_RULES, || {
        let mut meta = Metadata::new();
        meta.insert("type".into(), "gold_standard".into());
        meta.insert("category".into(), "radiology_pearls".into());
        meta.insert("author".into(), VISION_RULE_AUTHOR.into());
        meta
    })
    .await
}

async fn seed(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    prefix: &str,
    texts: &[&str],
    metadata: impl Fn() -> Metadata,
) -> Result<SeedReport> {
    let mut pending = Vec::new();
    let mut skipped = 0;
    for (i, text) in texts.iter().enumerate() {
        let id = format!("{prefix}_{:03}", i + 1);
        if store.get(&id)?.is_some() {
            skipped += 1;
        } else {
            pending.push((id, *text));
        }
    }
    if pending.is_empty() {
        info!(collection = store.name(), skipped, "nothing to seed");
        return Ok(SeedReport { added: 0, skipped });
    }

    let batch: Vec<&str> = pending.iter().map(|(_, t)| *t).collect();
    let vectors = embedder.embed(&batch).await?;
    let entries: Vec<MemoryEntry> = pending
        .into_iter()
        .zip(vectors)
        .map(|((id, text), vector)| {
            MemoryEntry::new(id.as_str(), text, vector).with_metadata(metadata())
        })
        .collect();
    let added = entries.len();
    store.add(entries)?;
    info!(collection = store.name(), added, skipped, "memory seeded");
    Ok(SeedReport { added, skipped })
}
