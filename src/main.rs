fn main() {
    println!("sitebreak-rs - Selective TF Binding Site Disruption Toolkit");
    println!();
    println!("🔬 Tools:");
    println!("  sitebreak  - Find substitutions that disrupt a target TF family's site");
    println!("               without affecting reliable motifs of other families");
    println!("  snv_screen - Rank every substitution around an SNV against an explicit");
    println!("               disrupt/preserve motif objective");
    println!();
    println!("📖 For help with each tool:");
    println!("  cargo run --bin sitebreak -- --help");
    println!("  cargo run --bin snv_screen -- --help");
    println!();
    println!("🚀 Quick start example:");
    println!("  cargo run --bin sitebreak -- 'AAGCAGCGGCTTCTGAAGGAGGTAT[C/T]TATTTTGGTCCCAAACAGAAAAGAG' SP1 \\");
    println!("    --motif-collection ./motif_collection --ape-jar ape.jar --thresholds ./motif_thresholds");
    println!();
    println!("💡 Both tools require java and the perfectosape scanner jar on the local machine.");
}
