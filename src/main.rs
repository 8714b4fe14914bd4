fn main() -> anyhow::Result<()> {
    civic_complaints_lib::run()
}
