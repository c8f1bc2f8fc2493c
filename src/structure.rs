use std::collections::HashSet;

const WATERS: [&str; 3] = ["HOH", "WAT", "DOD"];

const IONS_AND_METALS: [&str; 17] = [
    "NA", "K", "MG", "CA", "ZN", "FE", "MN", "CU", "CO", "NI", "CL", "SO4", "PO4", "IOD", "BR", "F",
    "I",
];

fn three_to_one(resname: &str) -> Option<char> {
    let code = match resname {
        "ALA" => 'A',
        "ARG" => 'R',
        "ASN" => 'N',
        "ASP" => 'D',
        "CYS" => 'C',
        "GLN" => 'Q',
        "GLU" => 'E',
        "GLY" => 'G',
        "HIS" => 'H',
        "ILE" => 'I',
        "LEU" => 'L',
        "LYS" => 'K',
        "MET" => 'M',
        "PHE" => 'F',
        "PRO" => 'P',
        "SER" => 'S',
        "THR" => 'T',
        "TRP" => 'W',
        "TYR" => 'Y',
        "VAL" => 'V',
        _ => return None,
    };
    Some(code)
}

fn record(line: &str) -> &str {
    line.get(0..6).unwrap_or(line).trim_end()
}

fn is_atom_record(line: &str) -> bool {
    matches!(record(line), "ATOM" | "HETATM")
}

fn field(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start..end).map(str::trim).unwrap_or("")
}

fn residue_name(line: &str) -> &str {
    field(line, 17, 20)
}

fn chain_id(line: &str) -> &str {
    field(line, 21, 22)
}

fn residue_id(line: &str) -> &str {
    // residue number plus insertion code
    field(line, 22, 27)
}

/// Atom records of the first model only.
fn first_model(text: &str) -> impl Iterator<Item = &str> {
    text.lines().take_while(|line| record(line) != "ENDMDL")
}

/// One-letter sequences per chain, in order of first appearance.
pub fn chain_sequences(pdb: &str) -> Vec<(String, String)> {
    let mut chains: Vec<(String, String)> = Vec::new();
    for line in first_model(pdb) {
        if record(line) != "ATOM" || field(line, 12, 16) != "CA" {
            continue;
        }
        let Some(code) = three_to_one(residue_name(line)) else {
            continue;
        };
        let chain = chain_id(line);
        match chains.iter_mut().find(|(id, _)| id == chain) {
            Some((_, seq)) => seq.push(code),
            None => chains.push((chain.to_string(), code.to_string())),
        }
    }
    chains
}

pub fn to_fasta(key: &str, chains: &[(String, String)]) -> String {
    let mut out = String::new();
    for (chain, seq) in chains {
        let label = if chain.is_empty() { "A" } else { chain.as_str() };
        out.push_str(&format!(">{key}_{label}\n{seq}\n"));
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ligand {
    pub resname: String,
    pub chain: String,
    pub resid: String,
    pub lines: Vec<String>,
}

impl Ligand {
    pub fn to_pdb(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push_str("\nEND\n");
        out
    }
}

/// First hetero residue that is neither water nor a common ion or metal.
pub fn first_ligand(pdb: &str) -> Option<Ligand> {
    let mut found: Option<Ligand> = None;
    for line in first_model(pdb) {
        if record(line) != "HETATM" {
            continue;
        }
        let resname = residue_name(line);
        if WATERS.contains(&resname) || IONS_AND_METALS.contains(&resname) {
            continue;
        }
        match found.as_mut() {
            None => {
                found = Some(Ligand {
                    resname: resname.to_string(),
                    chain: chain_id(line).to_string(),
                    resid: residue_id(line).to_string(),
                    lines: vec![line.to_string()],
                });
            }
            Some(lig)
                if lig.resname == resname
                    && lig.chain == chain_id(line)
                    && lig.resid == residue_id(line) =>
            {
                lig.lines.push(line.to_string());
            }
            Some(_) => break,
        }
    }
    found
}

pub fn has_ligand(pdb: &str) -> bool {
    first_ligand(pdb).is_some()
}

/// Polymer atoms only; ligands, waters and ions are stripped.
pub fn receptor_only(pdb: &str) -> String {
    let mut out = String::new();
    for line in first_model(pdb) {
        if matches!(record(line), "ATOM" | "TER") {
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str("END\n");
    out
}

pub fn coordinates(text: &str) -> Vec<[f64; 3]> {
    text.lines()
        .filter(|line| is_atom_record(line))
        .filter_map(|line| {
            let x = field(line, 30, 38).parse().ok()?;
            let y = field(line, 38, 46).parse().ok()?;
            let z = field(line, 46, 54).parse().ok()?;
            Some([x, y, z])
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DockingBox {
    pub center: [f64; 3],
    pub size: [f64; 3],
}

/// Bounding box of every atom in `text`.
pub fn docking_box(text: &str) -> Option<DockingBox> {
    let coords = coordinates(text);
    let first = *coords.first()?;
    let (min, max) = coords.iter().fold((first, first), |(mut lo, mut hi), c| {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(c[axis]);
            hi[axis] = hi[axis].max(c[axis]);
        }
        (lo, hi)
    });
    let mut center = [0.0; 3];
    let mut size = [0.0; 3];
    for axis in 0..3 {
        center[axis] = (min[axis] + max[axis]) / 2.0;
        size[axis] = max[axis] - min[axis];
    }
    Some(DockingBox { center, size })
}

pub fn first_vina_energy(pdbqt: &str) -> Option<f64> {
    pdbqt
        .lines()
        .find(|line| line.contains("REMARK VINA RESULT:"))
        .and_then(|line| line.split_whitespace().nth(3))
        .and_then(|value| value.parse().ok())
}

fn autodock_element(ad_type: &str) -> &str {
    match ad_type {
        "A" | "C" => "C",
        "OA" | "OS" | "O" => "O",
        "NA" | "NS" | "N" => "N",
        "SA" | "S" => "S",
        "HD" | "HS" | "H" => "H",
        other => other,
    }
}

fn pdbqt_to_pdb_line(line: &str) -> String {
    let base: String = line.chars().take(66).collect();
    let element = autodock_element(field(line, 77, 79));
    format!("{base:<76}{element:>2}")
}

/// Receptor followed by the first docked pose, as one PDB text.
pub fn combine_complex(receptor_pdbqt: &str, ligand_pdbqt: &str) -> String {
    let mut out = String::new();
    for line in receptor_pdbqt.lines().filter(|l| is_atom_record(l)) {
        out.push_str(&pdbqt_to_pdb_line(line));
        out.push('\n');
    }
    out.push_str("TER\n");
    for line in first_model(ligand_pdbqt).filter(|l| is_atom_record(l)) {
        let converted = pdbqt_to_pdb_line(line);
        out.push_str("HETATM");
        out.push_str(converted.get(6..).unwrap_or(""));
        out.push('\n');
    }
    out.push_str("END\n");
    out
}

/// Distinct residue names among hetero records, mostly for log lines.
pub fn hetero_residues(pdb: &str) -> HashSet<String> {
    first_model(pdb)
        .filter(|line| record(line) == "HETATM")
        .map(|line| residue_name(line).to_string())
        .collect()
}
